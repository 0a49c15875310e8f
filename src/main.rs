use clap::Parser;
use log::info;
use std::path::PathBuf;

use millwear::app;
use millwear::config::{DEFAULT_CONFIG_FILE, DashboardConfig};

/// Mill wear sensor dashboard server
#[derive(Parser, Debug)]
#[command(name = "millwear", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = DashboardConfig::load(&args.config)?;
    info!(
        "Loaded {} with {} page(s)",
        args.config.display(),
        config.pages.len()
    );

    // Start the web application
    app::run(config, &args.bind).await?;

    Ok(())
}

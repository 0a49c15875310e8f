#![cfg(not(tarpaulin_include))]

use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use millwear::cell::CellValue;
use millwear::downloader::export_workbook;
use millwear::graph::build_chart;
use millwear::login::hash_password;
use millwear::summary::summarize;

/// Offline tools for mill wear sensor databases
#[derive(Parser, Debug)]
#[command(name = "millwear-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the latest reading of every sensor
    Summary {
        /// Sensor database workbook
        workbook: PathBuf,
    },
    /// Print the chart description as JSON, or render it to a PNG file
    Chart {
        /// Sensor database workbook
        workbook: PathBuf,
        /// Write a PNG image instead of printing JSON
        #[cfg(feature = "web")]
        #[arg(long, value_name = "OUT")]
        png: Option<PathBuf>,
        /// Image width in pixels
        #[cfg(feature = "web")]
        #[arg(long, default_value_t = 1000)]
        width: u32,
        /// Image height in pixels
        #[cfg(feature = "web")]
        #[arg(long, default_value_t = 500)]
        height: u32,
    },
    /// Write the database with export column names
    Export {
        /// Sensor database workbook
        workbook: PathBuf,
        /// Output .xlsx file
        out: PathBuf,
    },
    /// Hash a password for the `[credentials]` section of the config file
    HashPassword {
        password: String,
    },
}

fn cell_text(cell: &Option<CellValue>) -> String {
    match cell {
        Some(value) => value.to_string(),
        None => "None".to_string(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let start = Instant::now();
    let cli = Cli::parse();

    match cli.command {
        Command::Summary { workbook } => {
            let records = summarize(&workbook)?;
            println!(
                "{:<16} {:<22} {:>12} {:>12}",
                "sensorName", "latestTime", "totalLength", "actualLength"
            );
            for record in &records {
                println!(
                    "{:<16} {:<22} {:>12} {:>12}",
                    record.sensor_name,
                    cell_text(&record.latest_time),
                    cell_text(&record.total_length),
                    cell_text(&record.actual_length)
                );
            }
        }
        #[cfg(feature = "web")]
        Command::Chart {
            workbook,
            png,
            width,
            height,
        } => {
            let chart = build_chart(&workbook)?;
            match png {
                Some(out) => {
                    let bytes = millwear::graph::render_png(&chart, width, height)?;
                    std::fs::write(&out, bytes)?;
                    info!("Chart written to {}", out.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&chart)?),
            }
        }
        #[cfg(not(feature = "web"))]
        Command::Chart { workbook } => {
            let chart = build_chart(&workbook)?;
            println!("{}", serde_json::to_string_pretty(&chart)?);
        }
        Command::Export { workbook, out } => {
            let bytes = export_workbook(&workbook)?;
            std::fs::write(&out, &bytes)?;
            info!("Exported {} ({} bytes) to {}", workbook.display(), bytes.len(), out.display());
        }
        Command::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
        }
    }

    info!("Done in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

//! Deployment configuration.
//!
//! One TOML file describes who may log in, how the session cookie is issued,
//! what the sidebar shows and which workbooks each dashboard page reads.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{Result, WearError};

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Top-level deployment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Session cookie settings
    pub cookie: CookieConfig,
    /// Registered users
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Sidebar and page texts
    #[serde(default)]
    pub branding: Branding,
    /// Directory with logos and install drawings, served under `/assets`
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    /// Base directory for relative workbook paths
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Dashboard pages listed under "Asset Navigation"
    #[serde(default = "default_pages")]
    pub pages: Vec<PageConfig>,
}

/// Cookie used to carry the session id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    /// Secret the cookie signing key is derived from
    pub key: String,
    pub expiry_days: u32,
}

/// `[credentials.usernames.<username>]` entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub usernames: BTreeMap<String, UserEntry>,
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    /// Display name
    pub name: String,
    /// Argon2 PHC hash of the password
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Texts and images of the page chrome
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Branding {
    pub page_title: String,
    pub login_title: String,
    pub logo: Option<String>,
    pub sidebar_image: Option<String>,
    pub site_header: String,
    pub app_header: String,
    pub tagline: String,
    pub footer: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            page_title: "Bisalloy Digital App".to_string(),
            login_title: "OptiWear®".to_string(),
            logo: Some("bisalloy.png".to_string()),
            sidebar_image: Some("mill.png".to_string()),
            site_header: "Northern Star Thunderbox Mine".to_string(),
            app_header: "Bisalloy Digital Wear Fusion App".to_string(),
            tagline: "Next Gen Wear Intelligence".to_string(),
            footer: "Developed by Bisalloy Digital Solutions 2025 | Contact us@ www.bisalloydigital.com.au"
                .to_string(),
        }
    }
}

/// One dashboard page (one mill)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    /// URL segment
    pub slug: String,
    /// Navigation label
    pub title: String,
    /// Heading shown at the top of the page
    pub heading: String,
    pub sections: Vec<SectionConfig>,
}

/// One shell section of a mill with its sensor database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionConfig {
    pub slug: String,
    /// Tab label, e.g. "FE Shell"
    pub label: String,
    /// Sensor database workbook, relative to `data_dir` unless absolute
    pub workbook: PathBuf,
    /// Install-location drawing under `assets_dir`
    #[serde(default)]
    pub drawing: Option<String>,
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn section(slug: &str, label: &str, workbook: &str, drawing: &str) -> SectionConfig {
    SectionConfig {
        slug: slug.to_string(),
        label: label.to_string(),
        workbook: PathBuf::from(workbook),
        drawing: Some(drawing.to_string()),
    }
}

/// The SAG mill page with its feed-end, middle and discharge-end shells
fn default_pages() -> Vec<PageConfig> {
    vec![PageConfig {
        slug: "sag-mill-may25".to_string(),
        title: "🔵  SAG Mill MAY25".to_string(),
        heading: "SAG Mill May2025 Wear Sensor Installation".to_string(),
        sections: vec![
            section("fe", "FE Shell", "FE2025May_Database_update.xlsx", "FE.png"),
            section("mid", "MID Shell", "MID2025May_Database_update.xlsx", "MID.png"),
            section("de", "DE Shell", "DE2025May_Database_update.xlsx", "DE.png"),
        ],
    }]
}

impl DashboardConfig {
    /// Parse and validate settings from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: DashboardConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| WearError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Check the invariants the router relies on
    pub fn validate(&self) -> Result<()> {
        if self.cookie.name.trim().is_empty() {
            return Err(WearError::Config("cookie name must not be empty".into()));
        }
        if self.cookie.key.is_empty() {
            return Err(WearError::Config("cookie key must not be empty".into()));
        }
        if self.cookie.expiry_days == 0 {
            return Err(WearError::Config("cookie expiry_days must be at least 1".into()));
        }
        if self.pages.is_empty() {
            return Err(WearError::Config("at least one page is required".into()));
        }

        let mut page_slugs = HashSet::new();
        for page in &self.pages {
            if !page_slugs.insert(page.slug.as_str()) {
                return Err(WearError::Config(format!("duplicate page slug '{}'", page.slug)));
            }
            let mut section_slugs = HashSet::new();
            for section in &page.sections {
                if !section_slugs.insert(section.slug.as_str()) {
                    return Err(WearError::Config(format!(
                        "duplicate section slug '{}' on page '{}'",
                        section.slug, page.slug
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up a page by slug
    pub fn page(&self, slug: &str) -> Option<&PageConfig> {
        self.pages.iter().find(|p| p.slug == slug)
    }

    /// Resolve a section's workbook against `data_dir`
    pub fn workbook_path(&self, section: &SectionConfig) -> PathBuf {
        if section.workbook.is_absolute() {
            section.workbook.clone()
        } else {
            self.data_dir.join(&section.workbook)
        }
    }
}

impl PageConfig {
    /// Look up a section by slug
    pub fn section(&self, slug: &str) -> Option<&SectionConfig> {
        self.sections.iter().find(|s| s.slug == slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [cookie]
        name = "wear_cookie"
        key = "a signing secret"
        expiry_days = 30

        [credentials.usernames.jsmith]
        name = "John Smith"
        password = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA"
    "#;

    #[test]
    fn test_defaults_fill_pages_and_branding() {
        let config = DashboardConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.cookie.expiry_days, 30);
        assert_eq!(config.credentials.usernames["jsmith"].name, "John Smith");
        assert_eq!(config.branding.site_header, "Northern Star Thunderbox Mine");
        assert_eq!(config.pages.len(), 1);

        let page = config.page("sag-mill-may25").unwrap();
        let labels: Vec<_> = page.sections.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["FE Shell", "MID Shell", "DE Shell"]);
        assert_eq!(
            config.workbook_path(page.section("mid").unwrap()),
            PathBuf::from("./MID2025May_Database_update.xlsx")
        );
    }

    #[test]
    fn test_custom_pages() {
        let text = format!(
            "data_dir = \"/srv/wear\"\n{}\n{}",
            MINIMAL,
            r#"
            [[pages]]
            slug = "ball-mill"
            title = "Ball Mill"
            heading = "Ball Mill Sensors"

            [[pages.sections]]
            slug = "fe"
            label = "FE Shell"
            workbook = "ball_fe.xlsx"
            "#
        );
        let config = DashboardConfig::from_toml_str(&text).unwrap();
        let page = config.page("ball-mill").unwrap();
        let section = page.section("fe").unwrap();

        assert_eq!(section.drawing, None);
        assert_eq!(config.workbook_path(section), PathBuf::from("/srv/wear/ball_fe.xlsx"));
        assert!(config.page("sag-mill-may25").is_none());
    }

    #[test]
    fn test_validation() {
        let zero_expiry = MINIMAL.replace("expiry_days = 30", "expiry_days = 0");
        assert!(matches!(
            DashboardConfig::from_toml_str(&zero_expiry),
            Err(WearError::Config(_))
        ));

        let mut config = DashboardConfig::from_toml_str(MINIMAL).unwrap();
        let duplicate = config.pages[0].clone();
        config.pages.push(duplicate);
        assert!(config.validate().is_err());

        let broken = "[cookie]\nname = 1";
        assert!(matches!(DashboardConfig::from_toml_str(broken), Err(WearError::Config(_))));
    }
}

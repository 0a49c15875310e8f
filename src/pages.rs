//! View models of the dashboard pages.
//!
//! Everything the templates show is computed here: the sidebar with its
//! navigation, and per shell section the metric cards, the chart link and
//! the download panel. A section whose workbook cannot be read or fails a
//! check carries the error text instead, without affecting its siblings.

use serde::Serialize;

use crate::config::{Branding, DashboardConfig, PageConfig, SectionConfig};
use crate::downloader::{download_file_name, validate_schema};
use crate::graph::chart_from_workbook;
use crate::loader::load_workbook;
use crate::login::Identity;
use crate::summary::{SummaryRecord, summarize_workbook};

/// Caption under every install-location drawing
pub const DRAWING_CAPTION: &str = "Sensor Install Locations";

/// Metric value shown for sensors without a reading
pub const NO_WEAR_DATA: &str = "No Wear Data Received";

/// Message shown next to an available download
pub const DOWNLOAD_READY: &str = "Sensor database available. Please click button to download!!!";

/// Link in the "Asset Navigation" list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavItem {
    pub title: String,
    pub href: String,
    pub active: bool,
}

/// Sidebar shown on every dashboard page
#[derive(Debug, Clone, Serialize)]
pub struct Sidebar {
    pub branding: Branding,
    pub logo_href: Option<String>,
    pub image_href: Option<String>,
    pub navigation: Vec<NavItem>,
    pub user: Identity,
}

/// One sensor's live-status card
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub label: String,
    /// `Latest Reading at: <time>`, absent without a reading
    pub caption: Option<String>,
    pub value: String,
    pub delta: Option<String>,
    /// `up`, `down` or `flat`, used for colouring the delta
    pub trend: Option<&'static str>,
}

/// State of a section's download button
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadPanel {
    pub available: bool,
    pub href: String,
    pub file_name: String,
    pub message: String,
}

/// One shell section of a page
#[derive(Debug, Clone, Serialize)]
pub struct SectionView {
    pub slug: String,
    pub label: String,
    pub drawing_href: Option<String>,
    pub drawing_caption: &'static str,
    pub metrics: Vec<MetricCard>,
    /// Why the section has no metrics, when its workbook could not be read
    pub error: Option<String>,
    pub chart_href: String,
    pub chart_error: Option<String>,
    pub download: DownloadPanel,
}

/// A full dashboard page
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub title: String,
    pub heading: String,
    pub sidebar: Sidebar,
    pub sections: Vec<SectionView>,
}

/// Location of a dashboard page
pub fn page_href(page: &PageConfig) -> String {
    format!("/pages/{}", urlencoding::encode(&page.slug))
}

/// Location of a per-section resource such as `chart.png`
pub fn section_href(page: &PageConfig, section: &SectionConfig, leaf: &str) -> String {
    format!(
        "{}/sections/{}/{}",
        page_href(page),
        urlencoding::encode(&section.slug),
        leaf
    )
}

fn asset_href(file: &str) -> String {
    format!("/assets/{}", urlencoding::encode(file))
}

/// Build the sidebar with `active` marked in the navigation
pub fn sidebar(config: &DashboardConfig, active: &PageConfig, user: &Identity) -> Sidebar {
    let navigation = config
        .pages
        .iter()
        .map(|page| NavItem {
            title: page.title.clone(),
            href: page_href(page),
            active: page.slug == active.slug,
        })
        .collect();

    Sidebar {
        branding: config.branding.clone(),
        logo_href: config.branding.logo.as_deref().map(asset_href),
        image_href: config.branding.sidebar_image.as_deref().map(asset_href),
        navigation,
        user: user.clone(),
    }
}

/// Turn a summary record into its metric card
///
/// A record without nominal length shows [`NO_WEAR_DATA`]; otherwise the
/// card shows the measured length in mm and the measured minus nominal delta.
pub fn metric_card(record: &SummaryRecord) -> MetricCard {
    let label = format!("{} Sensor Reading", record.sensor_name);

    if !record.has_reading() {
        return MetricCard {
            label,
            caption: None,
            value: NO_WEAR_DATA.to_string(),
            delta: None,
            trend: None,
        };
    }

    let caption = record
        .latest_time
        .as_ref()
        .map(|time| format!("Latest Reading at: {}", time));
    let trend = record.wear_delta().map(|delta| {
        if delta > 0.0 {
            "up"
        } else if delta < 0.0 {
            "down"
        } else {
            "flat"
        }
    });

    MetricCard {
        label,
        caption,
        value: record.display_length().unwrap_or_else(|| NO_WEAR_DATA.to_string()),
        delta: record.display_delta(),
        trend,
    }
}

/// Compute one section, reading its workbook once
pub fn section_view(config: &DashboardConfig, page: &PageConfig, section: &SectionConfig) -> SectionView {
    let path = config.workbook_path(section);
    let mut view = SectionView {
        slug: section.slug.clone(),
        label: section.label.clone(),
        drawing_href: section.drawing.as_deref().map(asset_href),
        drawing_caption: DRAWING_CAPTION,
        metrics: Vec::new(),
        error: None,
        chart_href: section_href(page, section, "chart.png"),
        chart_error: None,
        download: DownloadPanel {
            available: false,
            href: section_href(page, section, "download"),
            file_name: download_file_name(&path),
            message: String::new(),
        },
    };

    let workbook = match load_workbook(&path) {
        Ok(workbook) => workbook,
        Err(e) => {
            let message = e.to_string();
            view.error = Some(message.clone());
            view.chart_error = Some(message.clone());
            view.download.message = message;
            return view;
        }
    };

    view.metrics = summarize_workbook(&workbook).iter().map(metric_card).collect();
    view.chart_error = chart_from_workbook(&workbook).err().map(|e| e.to_string());
    match validate_schema(&workbook) {
        Ok(()) => {
            view.download.available = true;
            view.download.message = DOWNLOAD_READY.to_string();
        }
        Err(e) => view.download.message = e.to_string(),
    }

    view
}

/// Compute a whole page for the logged-in `user`
pub fn page_view(config: &DashboardConfig, page: &PageConfig, user: &Identity) -> PageView {
    PageView {
        title: page.title.clone(),
        heading: page.heading.clone(),
        sidebar: sidebar(config, page, user),
        sections: page
            .sections
            .iter()
            .map(|section| section_view(config, page, section))
            .collect(),
    }
}

/*!
# Mill Wear Dashboard

A login-protected web dashboard for mill liner wear sensors, built in Rust.

## Overview

Wear sensors installed in the shells of a grinding mill report their
remaining length over time. The readings of each shell section (feed end,
middle, discharge end) are collected in a sensor database workbook with one
worksheet per sensor. This crate turns those workbooks into:

- a summary with the latest reading of every sensor,
- a time-series chart of remaining length against the reline and failure
  limits of lifters and plates,
- a repackaged copy of the database with descriptive column names for
  download.

Rows whose nominal length is `12337` mark sensors that have not been
installed yet and are ignored by the summary and the chart.

## Architecture

### Data Layer
- **cell**: Cell values, timestamp parsing, Excel serial dates
- **spreadsheet**: Sensor sheet and workbook model, column names, sentinel filter
- **loader**: Reading `.xlsx` workbooks with calamine

### Processing Layer
- **summary**: Latest reading per sensor
- **graph**: Chart description and PNG rendering
- **downloader**: Export workbook with renamed columns (rust_xlsxwriter)

### Web Layer (feature `web`)
- **login**: Credentials, sessions and the login/logout handlers
- **pages**: Sidebar, metric cards and section panels
- **app**: Routing and application state

Configuration (users, cookie, branding and pages) is read from a TOML file,
see [`config::DashboardConfig`].

## REST API Endpoints

- `/login`, `/logout` - Session handling
- `/pages/{page}` - Dashboard page
- `/pages/{page}/sections/{section}/summary.json` - Latest readings
- `/pages/{page}/sections/{section}/chart.json` - Chart description
- `/pages/{page}/sections/{section}/chart.png` - Rendered chart
- `/pages/{page}/sections/{section}/download` - Repackaged sensor database
*/

pub mod cell;
pub mod config;
pub mod downloader;
pub mod error;
pub mod graph;
pub mod loader;
pub mod login;
pub mod spreadsheet;
pub mod summary;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod pages;

pub use error::{Result, WearError};

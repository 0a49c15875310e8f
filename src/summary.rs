use serde::Serialize;
use std::path::Path;

use crate::cell::{CellValue, format_number};
use crate::error::Result;
use crate::loader::load_workbook;
use crate::spreadsheet::{
    ACTUAL_LENGTH_COLUMN, SensorSheet, SensorWorkbook, TIME_COLUMN, TOTAL_LENGTH_COLUMN,
};

/// Latest reading of one sensor
///
/// The three reading fields are `None` together when the sheet has no
/// reading left after sentinel rows are removed. A column missing from the
/// sheet, or a blank cell in the last row, also reads as `None`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub sensor_name: String,
    pub latest_time: Option<CellValue>,
    pub total_length: Option<CellValue>,
    pub actual_length: Option<CellValue>,
}

impl SummaryRecord {
    fn empty(sensor_name: &str) -> Self {
        SummaryRecord {
            sensor_name: sensor_name.to_string(),
            latest_time: None,
            total_length: None,
            actual_length: None,
        }
    }

    /// Whether the sensor has reported a wear reading
    pub fn has_reading(&self) -> bool {
        self.total_length.is_some()
    }

    /// Measured minus nominal length, when both are numeric
    pub fn wear_delta(&self) -> Option<f64> {
        let actual = self.actual_length.as_ref()?.as_f64()?;
        let total = self.total_length.as_ref()?.as_f64()?;
        Some(actual - total)
    }

    /// Measured length as shown on a metric card, e.g. `44mm`
    pub fn display_length(&self) -> Option<String> {
        self.actual_length.as_ref().map(|v| format!("{}mm", v))
    }

    /// Signed wear delta as shown on a metric card, e.g. `-1`
    pub fn display_delta(&self) -> Option<String> {
        self.wear_delta().map(format_number)
    }
}

/// Summarize a sensor database workbook
///
/// Reads the workbook at `file_path` and produces one record per sheet, in
/// sheet order. See [`summarize_workbook`].
///
/// # Errors
/// * `WearError::FileNotFound` / `WearError::Workbook` when the file cannot be read
pub fn summarize(file_path: impl AsRef<Path>) -> Result<Vec<SummaryRecord>> {
    let workbook = load_workbook(file_path)?;
    Ok(summarize_workbook(&workbook))
}

/// Reduce each sheet of a loaded workbook to its latest reading
pub fn summarize_workbook(workbook: &SensorWorkbook) -> Vec<SummaryRecord> {
    workbook.sheets.iter().map(summarize_sheet).collect()
}

/// Reduce one sheet to its last non-sentinel row
///
/// Missing columns never fail here: the sentinel filter keeps every row when
/// the nominal length column is absent, and absent fields read as `None`.
pub fn summarize_sheet(sheet: &SensorSheet) -> SummaryRecord {
    let rows = match sheet.without_sentinel_rows(false) {
        Ok(rows) => rows,
        Err(_) => return SummaryRecord::empty(&sheet.name),
    };

    let Some((_, last)) = rows.last() else {
        return SummaryRecord::empty(&sheet.name);
    };

    let field = |column: &str| {
        sheet
            .column_index(column)
            .and_then(|index| last.get(index))
            .and_then(CellValue::non_empty)
            .cloned()
    };

    SummaryRecord {
        sensor_name: sheet.name.clone(),
        latest_time: field(TIME_COLUMN),
        total_length: field(TOTAL_LENGTH_COLUMN),
        actual_length: field(ACTUAL_LENGTH_COLUMN),
    }
}

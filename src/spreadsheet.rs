use std::path::PathBuf;

use crate::cell::CellValue;
use crate::error::{Result, WearError};

/// Timestamp column
pub const TIME_COLUMN: &str = "time";

/// Nominal (installed) sensor length column
pub const TOTAL_LENGTH_COLUMN: &str = "总长_DEC";

/// Measured (remaining) sensor length column
pub const ACTUAL_LENGTH_COLUMN: &str = "实际长度_DEC";

/// Nominal length reported by a sensor that has not been installed yet
pub const SENTINEL_TOTAL_LENGTH: f64 = 12337.0;

/// One worksheet of a sensor database: a header row plus data rows
///
/// The sheet name is the sensor name. Rows keep the order they have in the
/// file, which is assumed to be chronological.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// A sensor database workbook with its sheets in workbook order
#[derive(Clone, Debug)]
pub struct SensorWorkbook {
    pub path: PathBuf,
    pub sheets: Vec<SensorSheet>,
}

impl SensorSheet {
    /// Creates a sheet, padding short rows with empty cells to the header width
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, CellValue::Empty);
                }
                row
            })
            .collect();

        SensorSheet {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Index of the first column with the given header
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Index of a column the caller cannot do without
    pub fn require_column(&self, column: &str) -> Result<usize> {
        self.column_index(column)
            .ok_or_else(|| self.missing(column))
    }

    /// Rows that are not "sensor not installed" placeholders
    ///
    /// A row is dropped when its nominal length equals the sentinel 12337.
    /// When the nominal length column is absent every row is kept, unless
    /// `required` is set, in which case the absence is a `MissingColumn` error.
    ///
    /// # Arguments
    /// * `required` - Whether a missing nominal length column is an error
    ///
    /// # Returns
    /// * `Result<Vec<(usize, &[CellValue])>>` - The kept rows in file order,
    ///   each paired with its worksheet row number (the header is row 1)
    pub fn without_sentinel_rows(&self, required: bool) -> Result<Vec<(usize, &[CellValue])>> {
        let column = match self.column_index(TOTAL_LENGTH_COLUMN) {
            Some(index) => Some(index),
            None if required => return Err(self.missing(TOTAL_LENGTH_COLUMN)),
            None => None,
        };

        Ok(self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| match column {
                Some(index) => !row.get(index).is_some_and(is_sentinel),
                None => true,
            })
            .map(|(i, row)| (i + 2, row.as_slice()))
            .collect())
    }

    fn missing(&self, column: &str) -> WearError {
        WearError::MissingColumn {
            sheet: self.name.clone(),
            column: column.to_string(),
        }
    }
}

impl SensorWorkbook {
    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Path as shown to users in messages
    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// True when a nominal length cell holds the "not installed" marker
///
/// Only numeric cells qualify; the text "12337" is not a sentinel.
pub fn is_sentinel(cell: &CellValue) -> bool {
    cell.as_f64() == Some(SENTINEL_TOTAL_LENGTH)
}

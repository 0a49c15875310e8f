#![cfg(not(tarpaulin_include))]

use calamine::{Data, Range, Reader, open_workbook_auto};
use log::debug;
use std::path::Path;

use crate::cell::CellValue;
use crate::error::{Result, WearError};
use crate::spreadsheet::{SensorSheet, SensorWorkbook};

/// Load every sheet of a sensor database workbook
///
/// The workbook format is picked from the file extension (xlsx, xlsm, xlsb,
/// xls or ods). The first row of each sheet's used range is the header row;
/// the remaining rows are readings. Sheets keep their workbook order.
///
/// # Arguments
/// * `filepath` - Path to the workbook
///
/// # Returns
/// * `Result<SensorWorkbook>` - The loaded workbook or an error
///
/// # Errors
/// * `WearError::FileNotFound` if the path does not exist
/// * `WearError::Workbook` if the file cannot be opened or a sheet cannot be read
///
/// # Examples
/// ```no_run
/// use millwear::loader::load_workbook;
///
/// match load_workbook("FE2025May_Database_update.xlsx") {
///     Ok(workbook) => println!("Loaded {} sensors", workbook.sheets.len()),
///     Err(e) => eprintln!("Error loading workbook: {}", e),
/// }
/// ```
pub fn load_workbook(filepath: impl AsRef<Path>) -> Result<SensorWorkbook> {
    let path = filepath.as_ref();
    let path_str = path.display().to_string();

    if !path.exists() {
        return Err(WearError::FileNotFound(path_str));
    }

    let mut workbook = open_workbook_auto(path).map_err(|e| WearError::Workbook {
        path: path_str.clone(),
        message: e.to_string(),
    })?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| WearError::Workbook {
                path: path_str.clone(),
                message: format!("sheet '{}': {}", name, e),
            })?;
        sheets.push(sheet_from_range(name, &range));
    }

    debug!("Loaded {} sheets from {}", sheets.len(), path_str);

    Ok(SensorWorkbook {
        path: path.to_path_buf(),
        sheets,
    })
}

/// Split a calamine range into a header row and data rows
fn sheet_from_range(name: String, range: &Range<Data>) -> SensorSheet {
    let mut rows = range.rows();

    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .enumerate()
            .map(|(i, cell)| header_name(i, cell))
            .collect(),
        None => Vec::new(),
    };

    let data = rows
        .map(|row| row.iter().map(CellValue::from).collect())
        .collect();

    SensorSheet::new(name, headers, data)
}

// Blank headers get pandas-style placeholder names so column counts stay honest
fn header_name(index: usize, cell: &Data) -> String {
    match CellValue::from(cell) {
        CellValue::Empty => format!("Unnamed: {}", index),
        value => value.to_string(),
    }
}

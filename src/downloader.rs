#![cfg(not(tarpaulin_include))]

use log::warn;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::Path;

use crate::cell::{CellValue, to_excel_serial};
use crate::error::{Result, WearError};
use crate::loader::load_workbook;
use crate::spreadsheet::{SensorSheet, SensorWorkbook};

/// Column names of the exported sensor database, in order
pub const EXPORT_COLUMNS: [&str; 9] = [
    "Datetime",
    "TotalLength(HEX)",
    "SensorID(HEX)",
    "CurrentLength(HEX)",
    "CheckCode(HEX)",
    "TotalLength(mm)",
    "SensorID",
    "CurrentLength(mm)",
    "CheckCode",
];

/// MIME type of the exported workbook
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Repackage a sensor database for download
///
/// Re-reads every sheet of the workbook at `file_path`, checks that each has
/// exactly the nine export columns, renames the headers to
/// [`EXPORT_COLUMNS`] and writes all sheets, with their names and row
/// order, into a new in-memory XLSX workbook.
///
/// # Arguments
/// * `file_path` - Path to the source workbook
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content as bytes or an error
///
/// # Errors
/// * `WearError::FileNotFound` / `WearError::Workbook` if the source cannot be read
/// * `WearError::SchemaMismatch` naming the first sheet whose column count is not 9
///
/// # Examples
/// ```no_run
/// use millwear::downloader::export_workbook;
///
/// match export_workbook("FE2025May_Database_update.xlsx") {
///     Ok(xlsx_data) => println!("XLSX generated: {} bytes", xlsx_data.len()),
///     Err(e) => eprintln!("Failed to generate XLSX: {}", e),
/// }
/// ```
pub fn export_workbook(file_path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let workbook = load_workbook(file_path)?;
    repackage(&workbook).inspect_err(|e| warn!("Export of {} failed: {}", workbook.display_path(), e))
}

/// Check every sheet against the export schema without writing anything
pub fn validate_schema(workbook: &SensorWorkbook) -> Result<()> {
    for sheet in &workbook.sheets {
        if sheet.headers.len() != EXPORT_COLUMNS.len() {
            return Err(WearError::SchemaMismatch {
                sheet: sheet.name.clone(),
                expected: EXPORT_COLUMNS.len(),
                actual: sheet.headers.len(),
            });
        }
    }
    Ok(())
}

/// Write a loaded workbook out under the export schema
///
/// All sheets are validated first, so a mismatch produces no output at all.
pub fn repackage(workbook: &SensorWorkbook) -> Result<Vec<u8>> {
    validate_schema(workbook)?;

    let date_format = Format::new().set_num_format(DATETIME_FORMAT);
    let mut output = Workbook::new();

    for sheet in &workbook.sheets {
        let worksheet = output.add_worksheet();
        worksheet.set_name(&sheet.name)?;
        write_sheet(worksheet, sheet, &date_format)?;
    }

    Ok(output.save_to_buffer()?)
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &SensorSheet, date_format: &Format) -> Result<()> {
    for (c, name) in EXPORT_COLUMNS.iter().enumerate() {
        worksheet.write_string(0, c as u16, *name)?;
    }

    for (r, row) in sheet.rows.iter().enumerate() {
        let excel_row = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let col = c as u16;
            match cell {
                CellValue::Empty => {}
                CellValue::Number(n) => {
                    worksheet.write_number(excel_row, col, *n)?;
                }
                CellValue::Text(s) => {
                    worksheet.write_string(excel_row, col, s.as_str())?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(excel_row, col, *b)?;
                }
                CellValue::DateTime(dt) => {
                    worksheet.write_number_with_format(excel_row, col, to_excel_serial(dt), date_format)?;
                }
            }
        }
    }

    Ok(())
}

/// File name offered to the browser: the last component of the source path
pub fn download_file_name(file_path: impl AsRef<Path>) -> String {
    let path = file_path.as_ref();
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

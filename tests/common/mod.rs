#![allow(dead_code)]

use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};

pub const TIME: &str = "time";
pub const TOTAL: &str = "总长_DEC";
pub const ACTUAL: &str = "实际长度_DEC";

/// A fixture cell
#[derive(Clone, Debug)]
pub enum Value {
    Blank,
    Num(f64),
    Str(&'static str),
}

/// A fixture sheet: name, header row and data rows
pub struct Sheet {
    pub name: &'static str,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Value>>,
}

impl Sheet {
    /// Sensor sheet with time / nominal / measured columns
    pub fn sensor(name: &'static str, rows: &[(&'static str, f64, f64)]) -> Self {
        Sheet {
            name,
            headers: vec![TIME, TOTAL, ACTUAL],
            rows: rows
                .iter()
                .map(|(t, total, actual)| vec![Value::Str(t), Value::Num(*total), Value::Num(*actual)])
                .collect(),
        }
    }

    /// Sheet with `width` columns, the first three being the sensor columns
    pub fn wide(name: &'static str, width: usize, rows: &[(&'static str, f64, f64)]) -> Self {
        let mut sheet = Sheet::sensor(name, rows);
        let extra = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
        sheet.headers.extend(extra.iter().take(width - 3));
        for (i, row) in sheet.rows.iter_mut().enumerate() {
            for c in 3..width {
                row.push(Value::Num((i * 10 + c) as f64));
            }
        }
        sheet
    }
}

/// Write the sheets into `dir/name` and return the path
pub fn write_workbook(dir: &Path, name: &str, sheets: &[Sheet]) -> PathBuf {
    let mut workbook = Workbook::new();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name).unwrap();
        for (c, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string(0, c as u16, *header).unwrap();
        }
        for (r, row) in sheet.rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let (row, col) = ((r + 1) as u32, c as u16);
                match value {
                    Value::Blank => {}
                    Value::Num(n) => {
                        worksheet.write_number(row, col, *n).unwrap();
                    }
                    Value::Str(s) => {
                        worksheet.write_string(row, col, *s).unwrap();
                    }
                }
            }
        }
    }

    let path = dir.join(name);
    workbook.save(&path).unwrap();
    path
}

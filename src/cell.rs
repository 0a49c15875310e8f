use calamine::Data;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

use crate::error::{Result, WearError};

/// Timestamp layouts accepted in text cells, tried in order
///
/// Slash dates with the year last are read month first.
const TIMESTAMP_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Layouts carrying a UTC offset after the time
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f %z"];

/// Display layout for timestamps in summaries and the dashboard
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single worksheet cell after it has been read from disk
///
/// This is the crate's view of a calamine cell: integers and floats collapse
/// into `Number`, every date flavour becomes a `DateTime`, and anything that
/// cannot be represented otherwise is kept as `Text`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// True for blank cells
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Numeric value of the cell, if it holds one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns `None` for blank cells so missing data reads as null
    pub fn non_empty(&self) -> Option<&CellValue> {
        if self.is_empty() { None } else { Some(self) }
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::String(s) if s.is_empty() => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(parsed) => CellValue::DateTime(parsed),
                None => CellValue::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) => match parse_text_timestamp(s) {
                Some(parsed) => CellValue::DateTime(parsed),
                None => CellValue::Text(s.clone()),
            },
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Text(format!("#ERROR: {:?}", e)),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format(DISPLAY_FORMAT)),
        }
    }
}

/// Formats a number without a trailing `.0` when it is integral
///
/// # Examples
/// ```
/// use millwear::cell::format_number;
///
/// assert_eq!(format_number(44.0), "44");
/// assert_eq!(format_number(-1.5), "-1.5");
/// ```
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Converts an Excel serial date (1900 date system) into a timestamp
///
/// Returns `None` for non-finite or negative serials.
pub fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let millis = (serial * 86_400_000.0).round() as i64;
    excel_epoch().checked_add_signed(Duration::milliseconds(millis))
}

/// Converts a timestamp into an Excel serial date (1900 date system)
pub fn to_excel_serial(dt: &NaiveDateTime) -> f64 {
    let delta = *dt - excel_epoch();
    delta.num_milliseconds() as f64 / 86_400_000.0
}

/// Parses a text timestamp; offsets are dropped and the wall-clock time kept
fn parse_text_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    parse_naive_timestamp(text).or_else(|| parse_offset_timestamp(text))
}

fn parse_offset_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Some(utc) = text.strip_suffix(['Z', 'z']) {
        return parse_naive_timestamp(utc.trim_end());
    }
    OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(text, format).ok())
        .map(|dt| dt.naive_local())
}

fn parse_naive_timestamp(text: &str) -> Option<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parses a timestamp cell
///
/// Blank cells give `Ok(None)` and are treated as a missing point. Text is
/// matched against the accepted timestamp layouts and numbers are read as
/// Excel serial dates. Anything else is a `MalformedTimestamp` error naming
/// the sheet and the worksheet row.
///
/// # Arguments
/// * `cell` - The cell holding the timestamp
/// * `sheet` - Sheet name, used in the error
/// * `row` - Worksheet row number (the header is row 1), used in the error
pub fn parse_timestamp(cell: &CellValue, sheet: &str, row: usize) -> Result<Option<NaiveDateTime>> {
    let parsed = match cell {
        CellValue::Empty => return Ok(None),
        CellValue::DateTime(dt) => Some(*dt),
        CellValue::Number(n) => from_excel_serial(*n),
        CellValue::Text(s) => parse_text_timestamp(s),
        CellValue::Bool(_) => None,
    };

    parsed.map(Some).ok_or_else(|| WearError::MalformedTimestamp {
        sheet: sheet.to_string(),
        row,
        value: cell.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_parse_text_layouts() {
        let expected = at(2025, 5, 12, 8, 30, 0);
        for text in [
            "2025-05-12 08:30:00",
            "2025-05-12T08:30:00",
            "2025/05/12 08:30:00",
            "2025-05-12 08:30",
            " 2025-05-12 08:30:00.000 ",
        ] {
            let cell = CellValue::Text(text.to_string());
            assert_eq!(parse_timestamp(&cell, "S1", 1).unwrap(), Some(expected), "{text}");
        }

        let date_only = CellValue::Text("2025-05-12".to_string());
        assert_eq!(
            parse_timestamp(&date_only, "S1", 1).unwrap(),
            Some(at(2025, 5, 12, 0, 0, 0))
        );
    }

    #[test]
    fn test_slash_dates_with_year_last_are_month_first() {
        let cell = CellValue::Text("05/12/2025 08:30:00".to_string());
        assert_eq!(parse_timestamp(&cell, "S1", 2).unwrap(), Some(at(2025, 5, 12, 8, 30, 0)));

        let cell = CellValue::Text("05/13/2025 08:30:00".to_string());
        assert_eq!(parse_timestamp(&cell, "S1", 2).unwrap(), Some(at(2025, 5, 13, 8, 30, 0)));

        let cell = CellValue::Text("05/13/2025 08:30".to_string());
        assert_eq!(parse_timestamp(&cell, "S1", 2).unwrap(), Some(at(2025, 5, 13, 8, 30, 0)));

        let cell = CellValue::Text("05/13/2025".to_string());
        assert_eq!(parse_timestamp(&cell, "S1", 2).unwrap(), Some(at(2025, 5, 13, 0, 0, 0)));

        let cell = CellValue::Text("13/05/2025 08:30:00".to_string());
        assert!(parse_timestamp(&cell, "S1", 2).is_err());
    }

    #[test]
    fn test_timestamps_with_offset_keep_wall_clock() {
        let expected = at(2025, 5, 12, 8, 30, 0);
        for text in [
            "2025-05-12T08:30:00+08:00",
            "2025-05-12T08:30:00Z",
            "2025-05-12 08:30:00Z",
            "2025-05-12 08:30:00+08:00",
            "2025-05-12 08:30:00 +0800",
        ] {
            let cell = CellValue::Text(text.to_string());
            assert_eq!(parse_timestamp(&cell, "S1", 2).unwrap(), Some(expected), "{text}");
        }
    }

    #[test]
    fn test_blank_timestamp_is_missing_point() {
        assert_eq!(parse_timestamp(&CellValue::Empty, "S1", 3).unwrap(), None);
    }

    #[test]
    fn test_malformed_timestamp_names_sheet_and_row() {
        let cell = CellValue::Text("yesterday".to_string());
        match parse_timestamp(&cell, "Sensor7", 4) {
            Err(WearError::MalformedTimestamp { sheet, row, value }) => {
                assert_eq!(sheet, "Sensor7");
                assert_eq!(row, 4);
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(parse_timestamp(&CellValue::Bool(true), "S", 1).is_err());
    }

    #[test]
    fn test_excel_serial_conversion() {
        // 2025-05-12 12:00:00
        let dt = from_excel_serial(45789.5).unwrap();
        assert_eq!(dt, at(2025, 5, 12, 12, 0, 0));
        assert!((to_excel_serial(&dt) - 45789.5).abs() < 1e-9);
        assert_eq!(from_excel_serial(-1.0), None);
        assert_eq!(from_excel_serial(f64::NAN), None);
    }

    #[test]
    fn test_calamine_conversion() {
        assert_eq!(CellValue::from(&Data::Int(12337)), CellValue::Number(12337.0));
        assert_eq!(CellValue::from(&Data::Float(44.5)), CellValue::Number(44.5));
        assert_eq!(CellValue::from(&Data::String(String::new())), CellValue::Empty);
        assert_eq!(
            CellValue::from(&Data::DateTimeIso("2025-05-12T08:30:00".to_string())),
            CellValue::DateTime(at(2025, 5, 12, 8, 30, 0))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(CellValue::Number(45.0).to_string(), "45");
        assert_eq!(CellValue::Number(44.25).to_string(), "44.25");
        assert_eq!(
            CellValue::DateTime(at(2025, 5, 12, 8, 30, 0)).to_string(),
            "2025-05-12 08:30:00"
        );
        assert_eq!(CellValue::Empty.to_string(), "");
    }
}

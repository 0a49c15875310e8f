//! Error types for workbook processing, the dashboard and its tooling.

use thiserror::Error;

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, WearError>;

/// Errors raised while reading sensor workbooks or serving the dashboard
#[derive(Debug, Error)]
pub enum WearError {
    /// Workbook path does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Calamine could not open or read the workbook
    #[error("Failed to read workbook {path}: {message}")]
    Workbook { path: String, message: String },

    /// A column the operation cannot do without is absent from a sheet
    #[error("Sheet '{sheet}' has no '{column}' column")]
    MissingColumn { sheet: String, column: String },

    /// A timestamp cell that cannot be parsed
    #[error("Sheet '{sheet}' row {row}: cannot parse timestamp '{value}'")]
    MalformedTimestamp {
        sheet: String,
        row: usize,
        value: String,
    },

    /// Export schema check failed for a sheet
    #[error("Sheet '{sheet}' column count mismatch: expected {expected} columns, found {actual}")]
    SchemaMismatch {
        sheet: String,
        expected: usize,
        actual: usize,
    },

    /// Writing the export workbook failed
    #[error("Export error: {0}")]
    Export(String),

    /// Chart rendering failed
    #[error("Render error: {0}")]
    Render(String),

    /// Invalid or unreadable deployment configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Password hashing or verification failure
    #[error("Authentication error: {0}")]
    Auth(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rust_xlsxwriter::XlsxError> for WearError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        WearError::Export(err.to_string())
    }
}

impl From<toml::de::Error> for WearError {
    fn from(err: toml::de::Error) -> Self {
        WearError::Config(err.to_string())
    }
}

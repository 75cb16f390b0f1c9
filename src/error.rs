// 🚨 Error taxonomy shared by the loader, the reconciliation job and the web layer

use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, SatError>;

#[derive(Error, Debug)]
pub enum SatError {
    /// The store could not be reached (pool exhausted, file missing, open failed)
    #[error("Error de conexión a la base de datos: {0}")]
    Connection(String),

    /// Rejected user input (bad upload, missing field)
    #[error("{0}")]
    Validation(String),

    /// Table name outside the fixed allow-list
    #[error("Tabla no válida: {0}")]
    InvalidTable(String),

    /// No identifiers survived normalization
    #[error("El archivo no contiene RFCs válidos")]
    EmptyInput,

    /// CSV header shares no column with the destination table
    #[error("Ninguna columna válida coincide con la tabla {0}")]
    NoMatchingColumns(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<r2d2::Error> for SatError {
    fn from(err: r2d2::Error) -> Self {
        SatError::Connection(err.to_string())
    }
}

impl SatError {
    /// Errors the caller caused, as opposed to store or server failures
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SatError::Validation(_) | SatError::InvalidTable(_) | SatError::EmptyInput
        )
    }
}

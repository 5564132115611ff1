//
// error.rs
// Pet2Bids-rs
//
// Error taxonomy shared by both conversion pipelines. Every variant is fatal to the current conversion.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{tool} was not found; install it or add it to PATH")]
    ToolNotFound { tool: String },

    #[error("image conversion failed (exit code {code:?}): {diagnostics}")]
    ConversionFailed {
        code: Option<i32>,
        diagnostics: String,
    },

    #[error("no JSON sidecar found under {}", dir.display())]
    SidecarNotFound { dir: PathBuf },

    #[error("required field {field:?} is missing from {source_name}")]
    MissingField {
        field: String,
        source_name: &'static str,
    },

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("unsupported metadata format {extension:?} for {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("problem opening {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read spreadsheet {}: {message}", path.display())]
    Spreadsheet { path: PathBuf, message: String },

    #[error("could not parse JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn missing(field: impl Into<String>, source_name: &'static str) -> Self {
        ConvertError::MissingField {
            field: field.into(),
            source_name,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

//! Error types for pickup-planner

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown depot key: {0}")]
    UnknownDepot(String),

    #[error("Excel export error: {0}")]
    Excel(String),

    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

impl From<crate::loader::LoaderError> for Error {
    fn from(e: crate::loader::LoaderError) -> Self {
        Error::Input(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

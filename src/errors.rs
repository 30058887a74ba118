use crate::scheduler::ScanState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid scan configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot {operation} while the scan is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ScanState,
    },

    #[error("Invalid distance/error table: {0}")]
    InvalidTable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration format error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScanError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ScanError::InvalidConfig(msg.into())
    }

    pub(crate) fn table(msg: impl Into<String>) -> Self {
        ScanError::InvalidTable(msg.into())
    }
}

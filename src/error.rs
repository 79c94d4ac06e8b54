use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum BenchyError {
    #[error("failed to read configuration file {path}: {reason}")]
    ConfigRead { path: String, reason: String },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("failed to serialize or deserialize report: {0}")]
    Report(String),

    #[error("distributed barrier failed: {0}")]
    Barrier(String),
}

impl From<serde_yaml::Error> for BenchyError {
    fn from(err: serde_yaml::Error) -> Self {
        BenchyError::ConfigParse(err.to_string())
    }
}

impl From<serde_json::Error> for BenchyError {
    fn from(err: serde_json::Error) -> Self {
        BenchyError::Report(err.to_string())
    }
}

impl From<std::io::Error> for BenchyError {
    fn from(err: std::io::Error) -> Self {
        BenchyError::Io(err.to_string())
    }
}

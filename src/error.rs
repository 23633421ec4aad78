use thiserror::Error;

use crate::{parse::DurationError, prometheus::ResultShape};

#[derive(Debug, Error)]
pub enum QueryRunnerError {
    #[error("Client error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Unsupported result format: {shape}")]
    UnsupportedResultShape { shape: ResultShape },

    #[error("Query returned a matrix without any series")]
    EmptyResult,

    #[error("Step error: {0}")]
    StepParse(#[from] DurationError),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("Targets error: {0}")]
    Targets(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl From<std::io::Error> for QueryRunnerError {
    fn from(err: std::io::Error) -> Self {
        QueryRunnerError::Output(err.to_string())
    }
}

impl From<serde_json::Error> for QueryRunnerError {
    fn from(err: serde_json::Error) -> Self {
        QueryRunnerError::Output(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QueryRunnerError>;

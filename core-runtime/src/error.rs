use thiserror::Error;

/// Failures raised while setting up the shared runtime.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Logging already initialized: {0}")]
    LoggingInit(String),

    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

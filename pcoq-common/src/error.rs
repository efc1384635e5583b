//! Common error types for PCO Query

use thiserror::Error;

/// Common result type for PCO Query operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library and the server
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed CSV input
    #[error("CSV error on line {line}: {message}")]
    Csv { line: usize, message: String },
}

impl Error {
    pub(crate) fn csv(line: usize, message: impl Into<String>) -> Self {
        Error::Csv {
            line,
            message: message.into(),
        }
    }
}

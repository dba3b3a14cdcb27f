//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Network connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Content could not be encoded (QR payload too long, bad size, ...)
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Image decode or write failure
    #[error("Image error: {0}")]
    Image(String),

    /// Registered platform service reported an error
    #[error("Service error: {0}")]
    Service(String),
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;

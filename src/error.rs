//! Error types for the speech driver

use std::io;
use thiserror::Error;

/// Main error type for driver and backend operations
#[derive(Error, Debug)]
pub enum DriverError {
    /// Property name outside `{voices, voice, rate, volume, pitch}`
    #[error("unknown property {0}")]
    UnknownProperty(String),

    /// The backend cannot perform this operation
    #[error("{0} is not supported by this backend")]
    UnsupportedFeature(String),

    #[error("invalid value for property {property}: expected {expected}")]
    InvalidValue {
        property: String,
        expected: &'static str,
    },

    #[error("Speech backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

impl From<String> for DriverError {
    fn from(s: String) -> Self {
        DriverError::Other(s)
    }
}

impl From<&str> for DriverError {
    fn from(s: &str) -> Self {
        DriverError::Other(s.to_string())
    }
}

impl From<tts::Error> for DriverError {
    fn from(e: tts::Error) -> Self {
        DriverError::Backend(e.to_string())
    }
}

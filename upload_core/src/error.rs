//! Library error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, UploadError>;

/// Structural failures raised to the caller.
///
/// Validation failures are not errors: they live in the control's state and
/// reach observers through the status channel.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl UploadError {
    pub(crate) fn wrong_value_type(value: &serde_json::Value) -> Self {
        UploadError::InvalidArgument(format!(
            "FileUploadControl.set_value was provided with wrong argument type, {} was provided instead of a file list",
            value
        ))
    }
}

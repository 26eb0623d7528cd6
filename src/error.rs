use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// User-facing failures. Every variant ends up in the status line or an
/// error dialog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// The selected file could not be read or decoded
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Missing image, malformed resolution or frame rate, or a session
    /// already running
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The virtual camera could not be opened or written
    #[error("Camera error: {0}")]
    Device(String),
}

impl AppError {
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Flattens an anyhow chain (`outer: inner: root`) into a device error
    pub fn device(err: &anyhow::Error) -> Self {
        Self::Device(format!("{:#}", err))
    }
}

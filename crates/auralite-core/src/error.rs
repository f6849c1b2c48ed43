//! Error types for AuraLite.

use thiserror::Error;

/// Result type alias using AuraLite's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for AuraLite.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid sound container: {0}")]
    Format(String),

    #[error("Truncated sound data: header declares {declared} bytes, only {available} available")]
    TruncatedData { declared: u64, available: u64 },

    #[error("Failed to allocate {requested} bytes for sound data")]
    Allocation { requested: usize },

    // Output errors
    #[error("Audio device error: {0}")]
    Device(String),

    // Caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Returns true if the error was caused by the sound file itself.
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Format(_) | Self::TruncatedData { .. } | Self::Allocation { .. }
        )
    }

    /// Returns true if the audio output device failed.
    pub const fn is_device_error(&self) -> bool {
        matches!(self, Self::Device(_))
    }
}

//! Error types for the passport-studio-core library.
//!
//! Each failure mode of the pipeline has its own variant so callers can
//! decide between surfacing the message verbatim and showing a generic
//! banner. [`AppError::user_message`] performs that mapping.

use thiserror::Error;

/// Banner shown when the service fails without giving a reason.
pub const SYNTHESIS_FALLBACK_MESSAGE: &str = "Synthesis disrupted. Check neural link.";

/// Banner shown when the service answered but produced no image.
pub const NO_IMAGE_MESSAGE: &str = "AI failed to lock pose. Try a more direct portrait.";

/// Banner shown for any failure while rendering the export.
pub const EXPORT_FAILED_MESSAGE: &str = "Export interrupted. Try again.";

/// Errors that can occur within the passport-studio-core library.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (invalid values, bad base URL).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required environment variable was not found.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// The selected file could not be read or decoded as an image.
    #[error("Could not read the selected file as an image: {0}")]
    UploadDecodeFailure(String),

    /// The crop rectangle is empty or has non-positive dimensions.
    #[error("Crop rectangle is empty or invalid")]
    EmptySelection,

    /// Network, authentication or service failure during synthesis.
    ///
    /// Carries the service-provided message when there is one.
    #[error("Synthesis request failed: {}", .0.as_deref().unwrap_or(SYNTHESIS_FALLBACK_MESSAGE))]
    Transport(Option<String>),

    /// The service call succeeded but no inline image came back.
    #[error("{}", NO_IMAGE_MESSAGE)]
    NoImageProduced,

    /// The export canvas could not be built or encoded.
    #[error("Rendering surface unavailable: {0}")]
    RenderingUnavailable(String),

    /// The image handed to the resampler could not be decoded.
    #[error("Failed to decode image: {0}")]
    DecodeFailure(String),

    /// UI-related errors (window creation, event loop).
    #[error("UI error: {0}")]
    Ui(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a transport error, dropping blank messages so the
    /// generic fallback is used instead.
    pub fn transport(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if msg.trim().is_empty() {
            Self::Transport(None)
        } else {
            Self::Transport(Some(msg))
        }
    }

    /// Creates an upload decode error with the given message.
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::UploadDecodeFailure(msg.into())
    }

    /// Creates a rendering error with the given message.
    pub fn rendering(msg: impl Into<String>) -> Self {
        Self::RenderingUnavailable(msg.into())
    }

    /// Creates a decode error with the given message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeFailure(msg.into())
    }

    /// Creates a UI error with the given message.
    pub fn ui(msg: impl Into<String>) -> Self {
        Self::Ui(msg.into())
    }

    /// Whether this error came out of the export step.
    pub fn is_export_failure(&self) -> bool {
        matches!(
            self,
            Self::RenderingUnavailable(_) | Self::DecodeFailure(_) | Self::EmptySelection
        )
    }

    /// The single-line text to put in the error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(Some(msg)) => msg.clone(),
            Self::Transport(None) => SYNTHESIS_FALLBACK_MESSAGE.to_string(),
            Self::NoImageProduced => NO_IMAGE_MESSAGE.to_string(),
            e if e.is_export_failure() => EXPORT_FAILED_MESSAGE.to_string(),
            e => e.to_string(),
        }
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

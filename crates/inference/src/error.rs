//! Error type for the Ollama client adapter
//!
//! Each message is the human-readable string nodes show to the user.

use thiserror::Error;

/// Errors returned by [`OllamaClient`](crate::OllamaClient) operations
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Error: Failed to connect to Ollama server")]
    ConnectionFailed,

    #[error("Error: No models available on server")]
    NoModels,

    #[error("Error: Empty prompt")]
    EmptyPrompt,

    #[error("Error: Invalid or empty messages")]
    EmptyMessages,

    #[error("Error: Invalid message format")]
    InvalidMessageFormat,

    #[error("Error: Invalid role '{0}'")]
    InvalidRole(String),

    #[error("Error: No image data provided")]
    NoImages,

    #[error("Error: Model '{0}' does not support vision. Please use a vision model.")]
    NotVisionModel(String),

    #[error("Error: Too many images provided (maximum {max} allowed per request)")]
    TooManyImages { count: usize, max: usize },

    #[error("Error: Failed to prepare image for analysis: {0}")]
    ImagePreparation(String),

    #[error("Error: Failed to prepare any images for analysis")]
    NoPreparedImages,

    #[error("Error: Empty response from model")]
    EmptyResponse,

    #[error("Error: Empty response from vision model")]
    EmptyVisionResponse,

    #[error("Ollama API error: {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Connection error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image conversion error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InferenceError {
    /// Create an image preparation error
    pub fn image(reason: impl Into<String>) -> Self {
        Self::ImagePreparation(reason.into())
    }

    /// Whether this error was raised before any request reached the server
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyPrompt
                | Self::EmptyMessages
                | Self::InvalidMessageFormat
                | Self::InvalidRole(_)
                | Self::NoImages
                | Self::NotVisionModel(_)
                | Self::TooManyImages { .. }
        )
    }
}

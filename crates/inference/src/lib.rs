//! Ollama client adapter
//!
//! This library wraps an Ollama-compatible server for workflow nodes:
//! - **client**: connectivity probe, model listing, text, chat and vision requests
//! - **images**: image tensors and their transport to the server (embedded or temp file)
//! - **config**: the named server list read from a YAML settings file
//! - **connection**: the connection record passed between nodes
//!
//! # Example
//!
//! ```rust,ignore
//! use inference::{ChatMessage, ImageTransport, OllamaClient};
//!
//! let mut client = OllamaClient::new("127.0.0.1:11434", "llama3:8b", 30, ImageTransport::Embedded);
//! if client.test_connection().await {
//!     let outcome = client.chat(vec![ChatMessage::user("Hello!")], 0.7, 512).await?;
//!     println!("{}", outcome.text);
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod constants;
pub mod error;
pub mod images;
pub mod params;

// Re-exports for convenience
pub use client::{
    is_vision_model, parse_messages, ChatMessage, ChatOutcome, Completion, OllamaClient, Role,
};
pub use config::{config_path, ConfigError, ServerConfig, ServerDescriptor};
pub use connection::{ConnectionInfo, ConnectionStatus};
pub use error::InferenceError;
pub use images::{ImagePayload, ImageTensor, ImageTransport, PreparedImage};

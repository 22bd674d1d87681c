//! Processing nodes
//!
//! Nodes that send requests to the model server.

mod chat;
mod language;
mod vision;

pub use chat::OllamaChatTask;
pub use language::Language;
pub use vision::{OllamaVisionTask, DEFAULT_PROMPT};

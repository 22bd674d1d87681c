//! Workflow Nodes
//!
//! Ollama node implementations for the workflow engine.
//! Each node is a `graph_flow::Task` that registers its descriptor with the
//! node registry at link time.
//!
//! # Categories
//!
//! - **Input**: Server connection and image loading
//! - **Output**: Display of arbitrary values
//! - **Processing**: Chat and vision requests

pub mod context_io;
pub mod input;
pub mod output;
pub mod processing;

// Re-export all tasks for convenience
pub use input::*;
pub use output::*;
pub use processing::*;

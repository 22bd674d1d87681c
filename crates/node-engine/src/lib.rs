//! Node Engine - host-facing node model for Ollama workflow nodes
//!
//! This crate describes how nodes present themselves to a graph host:
//!
//! - `TaskDescriptor` / `TaskMetadata`: static port schemas per node type
//! - `PortDataType`: the type tags the host uses to validate connections
//! - `ContextKeys`: the `{task_id}.input.{port}` key convention
//! - `NodeRegistry`: descriptors collected at link time via `inventory`
//!
//! Execution itself is owned by the host; nodes implement graph-flow's
//! `Task` trait and exchange values through the shared `Context`.
//!
//! # Example
//!
//! ```ignore
//! use node_engine::{ContextKeys, NodeRegistry};
//!
//! let registry = NodeRegistry::with_builtins();
//! for meta in registry.all_metadata() {
//!     println!("{} ({} inputs)", meta.node_type, meta.inputs.len());
//! }
//!
//! context.set(&ContextKeys::input("chat_1", "message"), "Hello!".to_string()).await;
//! ```

pub mod descriptor;
pub mod error;
pub mod keys;
pub mod registry;
pub mod types;

// Re-export key types
pub use descriptor::{DescriptorFn, PortMetadata, TaskDescriptor, TaskMetadata, WidgetConfig};
pub use error::{NodeEngineError, Result};
pub use keys::ContextKeys;
pub use registry::NodeRegistry;
pub use types::{ExecutionMode, NodeCategory, PortDataType};

// Re-export graph-flow types that consumers will need
pub use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};

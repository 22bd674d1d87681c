//! Context key conventions
//!
//! Nodes communicate via the shared graph-flow `Context`, storing inputs and
//! outputs with well-defined key patterns:
//!
//! - Inputs: `{task_id}.input.{port_name}`
//! - Outputs: `{task_id}.output.{port_name}`
//! - Display: `{task_id}.stream.{port_name}`

/// Helper for building context keys
pub struct ContextKeys;

impl ContextKeys {
    /// Build an input key: `{task_id}.input.{port}`
    pub fn input(task_id: &str, port: &str) -> String {
        format!("{}.input.{}", task_id, port)
    }

    /// Build an output key: `{task_id}.output.{port}`
    pub fn output(task_id: &str, port: &str) -> String {
        format!("{}.output.{}", task_id, port)
    }

    /// Build a stream key: `{task_id}.stream.{port}`
    ///
    /// Hosts watch these keys to render node-side display widgets.
    pub fn stream(task_id: &str, port: &str) -> String {
        format!("{}.stream.{}", task_id, port)
    }
}

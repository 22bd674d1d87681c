//! Universal Display Task
//!
//! Shows any upstream value as text lines and passes it on.

use std::fmt;

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use node_engine::{
    ContextKeys, ExecutionMode, NodeCategory, PortDataType, PortMetadata, TaskDescriptor,
    TaskMetadata,
};
use serde_json::Value;

use crate::context_io::publish_text;

/// A value arriving on the display input
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<DisplayValue>),
    /// Anything else; rendered as pretty-printed JSON
    Dynamic(Value),
}

impl From<Value> for DisplayValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            Value::Bool(b) => Self::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None if n.is_f64() => Self::Float(n.as_f64().unwrap_or_default()),
                None => Self::Dynamic(Value::Number(n)),
            },
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            other => Self::Dynamic(other),
        }
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::List(items) => {
                let lines: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&lines.join("\n"))
            }
            Self::Dynamic(value) => match serde_json::to_string_pretty(value) {
                Ok(json) => f.write_str(&json),
                Err(_) => write!(f, "{}", value),
            },
        }
    }
}

impl DisplayValue {
    /// Display lines for one incoming value
    ///
    /// The input arrives in list mode: a top-level array is a sequence of
    /// values, each contributing one line. A nested list replaces every
    /// line collected so far.
    pub fn lines(&self) -> Vec<String> {
        let values = match self {
            Self::List(values) => values.as_slice(),
            single => std::slice::from_ref(single),
        };

        let mut lines = Vec::new();
        for value in values {
            match value {
                Self::List(inner) => lines = inner.iter().map(ToString::to_string).collect(),
                other => lines.push(other.to_string()),
            }
        }
        lines
    }
}

/// Collapse display lines into the node output
pub fn output_value(mut lines: Vec<String>) -> Value {
    if lines.len() == 1 {
        Value::String(lines.remove(0))
    } else {
        Value::from(lines)
    }
}

/// Universal Display Task
///
/// # Inputs (from context)
/// - `{task_id}.input.anything` (optional) - Any value
///
/// # Outputs (to context)
/// - `{task_id}.output.output` - The single line, or the list of lines
///
/// # Streaming
/// - `{task_id}.stream.output` - Stream event with the display lines
#[derive(Clone)]
pub struct UniversalDisplayTask {
    /// Unique identifier for this task instance
    task_id: String,
}

impl UniversalDisplayTask {
    /// Port ID for the value input
    pub const PORT_ANYTHING: &'static str = "anything";
    /// Port ID for the pass-through output
    pub const PORT_OUTPUT: &'static str = "output";

    /// Create a new display task
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }

    /// Get the task ID
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl TaskDescriptor for UniversalDisplayTask {
    fn descriptor() -> TaskMetadata {
        TaskMetadata {
            node_type: "universal-display".to_string(),
            category: NodeCategory::Output,
            label: "Universal Display".to_string(),
            description: "Displays any type of data".to_string(),
            inputs: vec![
                PortMetadata::optional(Self::PORT_ANYTHING, "Anything", PortDataType::Any)
                    .with_tooltip("Any type of data"),
            ],
            outputs: vec![PortMetadata::optional(
                Self::PORT_OUTPUT,
                "Output",
                PortDataType::Any,
            )],
            execution_mode: ExecutionMode::Reactive,
        }
    }
}

inventory::submit!(node_engine::DescriptorFn(UniversalDisplayTask::descriptor));

#[async_trait]
impl Task for UniversalDisplayTask {
    fn id(&self) -> &str {
        &self.task_id
    }

    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let input_key = ContextKeys::input(&self.task_id, Self::PORT_ANYTHING);
        let lines = match context.get::<Value>(&input_key).await {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => DisplayValue::from(value).lines(),
        };

        publish_text(
            &context,
            &self.task_id,
            Self::PORT_OUTPUT,
            Value::from(lines.clone()),
        )
        .await;

        log::debug!(
            "UniversalDisplayTask {}: displaying {} line(s)",
            self.task_id,
            lines.len()
        );

        let summary = lines.join("\n");
        let output_key = ContextKeys::output(&self.task_id, Self::PORT_OUTPUT);
        context.set(&output_key, output_value(lines)).await;

        Ok(TaskResult::new(Some(summary), NextAction::Continue))
    }
}

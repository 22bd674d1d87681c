//! Task descriptor trait and metadata types
//!
//! This module provides the `TaskDescriptor` trait that allows tasks to
//! self-describe their metadata (ports, widgets, category, label).
//!
//! This creates a single source of truth for node definitions - the task
//! implementation defines both its behavior AND the schema the host renders.

use serde::{Deserialize, Serialize};

use crate::types::{ExecutionMode, NodeCategory, PortDataType};

/// Trait for tasks that can describe their metadata
///
/// # Example
///
/// ```ignore
/// use node_engine::{TaskDescriptor, TaskMetadata, PortMetadata};
/// use node_engine::{NodeCategory, ExecutionMode, PortDataType};
///
/// impl TaskDescriptor for MyTask {
///     fn descriptor() -> TaskMetadata {
///         TaskMetadata {
///             node_type: "my-task".to_string(),
///             category: NodeCategory::Processing,
///             label: "My Task".to_string(),
///             description: "Does something useful".to_string(),
///             inputs: vec![
///                 PortMetadata::required("timeout", "Timeout", PortDataType::Int)
///                     .with_default(serde_json::json!(30))
///                     .with_range(5.0, 300.0),
///             ],
///             outputs: vec![
///                 PortMetadata::required("output", "Output", PortDataType::String),
///             ],
///             execution_mode: ExecutionMode::Reactive,
///         }
///     }
/// }
/// ```
pub trait TaskDescriptor {
    /// Get the static metadata for this task type
    fn descriptor() -> TaskMetadata
    where
        Self: Sized;
}

/// Link-time registration of a task descriptor
///
/// Node crates submit one of these per node type with
/// `inventory::submit!(node_engine::DescriptorFn(MyTask::descriptor));`
pub struct DescriptorFn(pub fn() -> TaskMetadata);

inventory::collect!(DescriptorFn);

/// Complete metadata for a task type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    /// Unique type identifier (e.g., "ollama-chat")
    pub node_type: String,
    /// Category for UI grouping
    pub category: NodeCategory,
    /// Human-readable label
    pub label: String,
    /// Description of what the task does
    pub description: String,
    /// Input port definitions
    pub inputs: Vec<PortMetadata>,
    /// Output port definitions
    pub outputs: Vec<PortMetadata>,
    /// Execution mode
    pub execution_mode: ExecutionMode,
}

impl TaskMetadata {
    /// Find an input port by id
    pub fn input(&self, id: &str) -> Option<&PortMetadata> {
        self.inputs.iter().find(|p| p.id == id)
    }

    /// Find an output port by id
    pub fn output(&self, id: &str) -> Option<&PortMetadata> {
        self.outputs.iter().find(|p| p.id == id)
    }
}

/// Widget hints the host uses to render an input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    /// Allowed values for enum ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub multiline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

/// Metadata for a port (input or output)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMetadata {
    /// Port identifier (used in context keys)
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Data type
    pub data_type: PortDataType,
    /// Whether this input is required
    pub required: bool,
    /// Widget hints, if the host should render one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<WidgetConfig>,
}

impl PortMetadata {
    /// Create a new port metadata
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        data_type: PortDataType,
        required: bool,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            data_type,
            required,
            widget: None,
        }
    }

    /// Create a required port
    pub fn required(
        id: impl Into<String>,
        label: impl Into<String>,
        data_type: PortDataType,
    ) -> Self {
        Self::new(id, label, data_type, true)
    }

    /// Create an optional port
    pub fn optional(
        id: impl Into<String>,
        label: impl Into<String>,
        data_type: PortDataType,
    ) -> Self {
        Self::new(id, label, data_type, false)
    }

    fn widget_mut(&mut self) -> &mut WidgetConfig {
        self.widget.get_or_insert_with(WidgetConfig::default)
    }

    /// Set the widget's default value
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.widget_mut().default = Some(value);
        self
    }

    /// Set the widget's numeric range
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        let widget = self.widget_mut();
        widget.min = Some(min);
        widget.max = Some(max);
        self
    }

    /// Set the widget's numeric step
    pub fn with_step(mut self, step: f64) -> Self {
        self.widget_mut().step = Some(step);
        self
    }

    /// Set the allowed options of an enum port
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.widget_mut().options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Render the text widget as a multiline box
    pub fn multiline(mut self) -> Self {
        self.widget_mut().multiline = true;
        self
    }

    /// Set the tooltip shown on hover
    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.widget_mut().tooltip = Some(tooltip.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_metadata_required() {
        let port = PortMetadata::required("message", "Message", PortDataType::String);
        assert_eq!(port.id, "message");
        assert_eq!(port.label, "Message");
        assert!(port.required);
        assert!(port.widget.is_none());
    }

    #[test]
    fn test_port_metadata_optional() {
        let port = PortMetadata::optional("connection", "Connection", PortDataType::Connection);
        assert!(!port.required);
    }

    #[test]
    fn test_widget_builders() {
        let port = PortMetadata::required("timeout", "Timeout", PortDataType::Int)
            .with_default(serde_json::json!(30))
            .with_range(5.0, 300.0)
            .with_tooltip("Request timeout (seconds)");

        let widget = port.widget.unwrap();
        assert_eq!(widget.default, Some(serde_json::json!(30)));
        assert_eq!(widget.min, Some(5.0));
        assert_eq!(widget.max, Some(300.0));
        assert!(!widget.multiline);
        assert!(widget.options.is_empty());
    }

    #[test]
    fn test_task_metadata_serialization() {
        let metadata = TaskMetadata {
            node_type: "test-task".to_string(),
            category: NodeCategory::Processing,
            label: "Test Task".to_string(),
            description: "A test task".to_string(),
            inputs: vec![PortMetadata::required("language", "Language", PortDataType::Enum)
                .with_options(["中文", "English"])],
            outputs: vec![PortMetadata::required("response", "Response", PortDataType::String)],
            execution_mode: ExecutionMode::Batch,
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["nodeType"], "test-task"); // camelCase
        assert_eq!(json["inputs"][0]["dataType"], "enum");
        assert_eq!(json["inputs"][0]["widget"]["options"][1], "English");
        // Empty widget fields are omitted
        assert!(json["inputs"][0]["widget"].get("min").is_none());
        assert!(json["outputs"][0].get("widget").is_none());

        assert!(metadata.input("language").is_some());
        assert!(metadata.output("missing").is_none());
    }
}

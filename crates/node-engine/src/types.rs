//! Port type tags and node classification
//!
//! These mirror the host's own type-tagging convention: every port carries a
//! tag, and the host only lets an output connect to an input whose tag is
//! compatible.

use serde::{Deserialize, Serialize};

/// The data type of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDataType {
    /// Accepts any type
    Any,
    /// Text string
    String,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// Boolean value
    Boolean,
    /// One of a fixed set of string options
    Enum,
    /// Image tensor (`batch × height × width × channels`)
    Image,
    /// Serialized Ollama connection info
    Connection,
}

impl PortDataType {
    /// Check if this type can connect to another type
    pub fn is_compatible_with(&self, other: &PortDataType) -> bool {
        // Any type is compatible with everything
        if matches!(self, PortDataType::Any) || matches!(other, PortDataType::Any) {
            return true;
        }

        // Integers widen into float inputs
        if matches!(self, PortDataType::Int) && matches!(other, PortDataType::Float) {
            return true;
        }

        // Enum widgets carry plain strings
        if matches!(
            (self, other),
            (PortDataType::Enum, PortDataType::String) | (PortDataType::String, PortDataType::Enum)
        ) {
            return true;
        }

        self == other
    }
}

/// Category of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Input nodes (connections, image loading)
    Input,
    /// Output nodes (display)
    Output,
    /// Processing nodes (chat, vision)
    Processing,
}

impl NodeCategory {
    /// Menu path the host shows the node under
    pub fn menu_path(&self) -> &'static str {
        match self {
            NodeCategory::Input => "Ollama Nodes/Input",
            NodeCategory::Output => "Ollama Nodes/Utility",
            NodeCategory::Processing => "Ollama Nodes/Ollama",
        }
    }
}

/// Execution mode for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Execute once when inputs are available
    Batch,
    /// Execute reactively when inputs change
    Reactive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_data_type_compatibility() {
        assert!(PortDataType::Any.is_compatible_with(&PortDataType::Image));
        assert!(PortDataType::Connection.is_compatible_with(&PortDataType::Any));
        assert!(PortDataType::Int.is_compatible_with(&PortDataType::Float));
        assert!(!PortDataType::Float.is_compatible_with(&PortDataType::Int));
        assert!(PortDataType::Enum.is_compatible_with(&PortDataType::String));
        assert!(!PortDataType::Image.is_compatible_with(&PortDataType::Connection));
    }

    #[test]
    fn test_port_data_type_serialization() {
        let json = serde_json::to_string(&PortDataType::Connection).unwrap();
        assert_eq!(json, "\"connection\"");
    }

    #[test]
    fn test_menu_path() {
        assert_eq!(NodeCategory::Processing.menu_path(), "Ollama Nodes/Ollama");
        assert_eq!(NodeCategory::Output.menu_path(), "Ollama Nodes/Utility");
    }
}

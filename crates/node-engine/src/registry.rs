//! Node type registry
//!
//! Maps node type strings to the metadata their tasks describe. The host
//! reads this to render the node palette; the HTTP surface serves it as JSON.
//!
//! # Usage
//!
//! ```ignore
//! use node_engine::NodeRegistry;
//!
//! // Every descriptor submitted through `inventory` in linked crates
//! let registry = NodeRegistry::with_builtins();
//! let chat = registry.get_metadata("ollama-chat");
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::descriptor::{DescriptorFn, TaskMetadata};
use crate::types::NodeCategory;

/// Registry of node types with their metadata
///
/// Entries are kept ordered by node type so listings are stable.
///
/// # Composability
///
/// Registries can be composed by merging:
/// ```ignore
/// let mut registry = NodeRegistry::with_builtins();
/// registry.merge(external_registry); // Add plugin nodes
/// ```
pub struct NodeRegistry {
    entries: BTreeMap<String, TaskMetadata>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Create a registry holding every descriptor submitted via `inventory`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for descriptor in inventory::iter::<DescriptorFn> {
            let metadata = (descriptor.0)();
            if registry.has_node_type(&metadata.node_type) {
                log::warn!("Duplicate node type '{}' registered", metadata.node_type);
            }
            registry.register_metadata(metadata);
        }
        log::debug!("Registered {} built-in node types", registry.entries.len());
        registry
    }

    /// Register a node type's metadata, replacing any previous entry
    pub fn register_metadata(&mut self, metadata: TaskMetadata) {
        self.entries.insert(metadata.node_type.clone(), metadata);
    }

    /// Get metadata for a node type
    pub fn get_metadata(&self, node_type: &str) -> Option<&TaskMetadata> {
        self.entries.get(node_type)
    }

    /// Get all registered metadata, ordered by node type
    pub fn all_metadata(&self) -> Vec<&TaskMetadata> {
        self.entries.values().collect()
    }

    /// Get metadata grouped by category
    pub fn metadata_by_category(&self) -> HashMap<NodeCategory, Vec<&TaskMetadata>> {
        let mut grouped: HashMap<NodeCategory, Vec<&TaskMetadata>> = HashMap::new();
        for metadata in self.entries.values() {
            grouped.entry(metadata.category).or_default().push(metadata);
        }
        grouped
    }

    /// Check if a node type is registered
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// List all registered node type strings
    pub fn node_types(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` if they share the same node_type.
    pub fn merge(&mut self, other: NodeRegistry) {
        self.entries.extend(other.entries);
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

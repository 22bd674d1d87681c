//! Serialized connection record passed between nodes
//!
//! The connector node probes a server and emits a `ConnectionInfo`; chat and
//! vision nodes rebuild a client from it. The record is a snapshot: the
//! server it names may have gone away since, so consumers re-probe when
//! `connected` is false.

use serde::{Deserialize, Serialize};

use crate::constants::defaults;

/// Outcome of the connector's probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    /// The server did not answer the probe
    #[default]
    Failed,
    /// The connector itself failed before probing
    Error,
}

/// Connection payload
///
/// Every field has a default so partial records from older workflows still
/// deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionInfo {
    pub server_url: String,
    pub model: String,
    pub timeout: u64,
    pub use_base64: bool,
    pub available_models: Vec<String>,
    pub connected: bool,
    pub selected_model: String,
    pub user_selected_model: String,
    pub server_name: String,
    pub connection_status: ConnectionStatus,
    pub server_changed: bool,
    pub auto_selected: bool,
    pub available_models_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            server_url: defaults::SERVER_URL.to_string(),
            model: defaults::MODEL.to_string(),
            timeout: defaults::TIMEOUT_SECS,
            use_base64: false,
            available_models: Vec::new(),
            connected: false,
            selected_model: String::new(),
            user_selected_model: String::new(),
            server_name: String::new(),
            connection_status: ConnectionStatus::default(),
            server_changed: false,
            auto_selected: false,
            available_models_count: 0,
            error: None,
        }
    }
}

impl ConnectionInfo {
    /// Fallback record emitted when the connector fails
    pub fn failure(
        server_name: &str,
        server_url: &str,
        model: &str,
        timeout: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.to_string(),
            model: model.to_string(),
            timeout,
            selected_model: model.to_string(),
            user_selected_model: model.to_string(),
            server_name: server_name.to_string(),
            connection_status: ConnectionStatus::Error,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Parse a record from its JSON form
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

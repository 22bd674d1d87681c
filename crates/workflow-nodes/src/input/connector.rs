//! Ollama Connector Task
//!
//! Resolves a configured server by name, probes it, and picks a model.
//! Emits a `ConnectionInfo` record consumed by the chat and vision nodes.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use inference::{ConnectionInfo, ConnectionStatus, ImageTransport, OllamaClient, ServerConfig};
use node_engine::{
    ContextKeys, ExecutionMode, NodeCategory, PortDataType, PortMetadata, TaskDescriptor,
    TaskMetadata,
};
use parking_lot::Mutex;

use crate::context_io::{read_input, read_int};

/// Model widget value that asks for the first available model
pub const REFRESH_MODEL: &str = "refresh";

/// Pick the model to use after a probe
///
/// Returns the chosen model and whether it was picked automatically.
/// - `refresh` takes the first available model, or stays `refresh` if none
/// - otherwise the requested model is kept when the server has it, and
///   replaced by the first available model when it does not
pub fn select_model(requested: &str, available: &[String], server_changed: bool) -> (String, bool) {
    if requested == REFRESH_MODEL {
        return match available.first() {
            Some(first) => {
                log::info!("Auto-selected first available model: {}", first);
                (first.clone(), true)
            }
            None => {
                log::info!("No models available, keeping refresh mode");
                (REFRESH_MODEL.to_string(), false)
            }
        };
    }

    if available.iter().any(|m| m == requested) {
        if server_changed {
            log::info!("Server changed - keeping user's model: {}", requested);
        }
        return (requested.to_string(), false);
    }

    match available.first() {
        Some(first) => {
            log::warn!(
                "Model '{}' not found on server, auto-switching to: {}",
                requested,
                first
            );
            (first.clone(), true)
        }
        None => {
            log::info!("No available models to switch to");
            (requested.to_string(), false)
        }
    }
}

struct ConnectorInputs {
    server_name: String,
    model: String,
    timeout: i64,
}

/// Ollama Connector Task
///
/// # Inputs (from context)
/// - `{task_id}.input.server_name` - Configured server name (default: first server)
/// - `{task_id}.input.model` - Model name, or `refresh` (default: `refresh`)
/// - `{task_id}.input.timeout` - Request timeout in seconds, 5-300 (default: 30)
///
/// # Outputs (to context)
/// - `{task_id}.output.connection` - The `ConnectionInfo` record
///
/// Failures never abort the graph: a record with `connection_status = error`
/// is emitted instead.
#[derive(Clone)]
pub struct OllamaConnectorTask {
    /// Unique identifier for this task instance
    task_id: String,
    /// Server list file
    config_path: PathBuf,
    /// Server URL of the previous run, to report server changes
    last_server_url: Arc<Mutex<String>>,
}

impl OllamaConnectorTask {
    /// Port ID for server name input
    pub const PORT_SERVER_NAME: &'static str = "server_name";
    /// Port ID for model input
    pub const PORT_MODEL: &'static str = "model";
    /// Port ID for timeout input
    pub const PORT_TIMEOUT: &'static str = "timeout";
    /// Port ID for connection output
    pub const PORT_CONNECTION: &'static str = "connection";

    /// Create a connector reading the default server list
    pub fn new(task_id: impl Into<String>) -> Self {
        Self::with_config_path(task_id, inference::config_path())
    }

    /// Create a connector reading a specific server list file
    pub fn with_config_path(task_id: impl Into<String>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            task_id: task_id.into(),
            config_path: config_path.into(),
            last_server_url: Arc::new(Mutex::new(String::new())),
        }
    }

    /// Get the task ID
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    async fn read_inputs(
        &self,
        context: &Context,
        config: &ServerConfig,
    ) -> node_engine::Result<ConnectorInputs> {
        let server_name: Option<String> =
            read_input(context, &self.task_id, Self::PORT_SERVER_NAME).await?;
        let model: Option<String> = read_input(context, &self.task_id, Self::PORT_MODEL).await?;
        let timeout = read_int(context, &self.task_id, Self::PORT_TIMEOUT).await?;

        Ok(ConnectorInputs {
            server_name: server_name.unwrap_or_else(|| config.default_server_name()),
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| REFRESH_MODEL.to_string()),
            timeout: timeout.unwrap_or(inference::constants::defaults::TIMEOUT_SECS as i64),
        })
    }

    /// Probe the named server and build the connection record
    async fn connect(&self, inputs: &ConnectorInputs, config: &ServerConfig) -> ConnectionInfo {
        let server_url = config.resolve_url(&inputs.server_name);
        let mut client = OllamaClient::new(
            &server_url,
            inputs.model.clone(),
            inputs.timeout,
            ImageTransport::Embedded,
        );

        let server_changed = {
            let last = self.last_server_url.lock();
            *last != client.server_url()
        };
        if server_changed {
            log::info!(
                "Server changed from '{}' to '{}'",
                self.last_server_url.lock(),
                client.server_url()
            );
        }

        let connected = client.test_connection().await;
        *self.last_server_url.lock() = client.server_url().to_string();

        let (selected, auto_selected) =
            select_model(&inputs.model, client.available_models(), server_changed && connected);
        client.set_model(selected.clone());

        ConnectionInfo {
            selected_model: selected,
            user_selected_model: inputs.model.clone(),
            server_name: inputs.server_name.clone(),
            connection_status: if connected {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Failed
            },
            server_changed,
            auto_selected,
            ..client.to_connection_info()
        }
    }
}

impl TaskDescriptor for OllamaConnectorTask {
    fn descriptor() -> TaskMetadata {
        let config = ServerConfig::load_default();

        TaskMetadata {
            node_type: "ollama-connector".to_string(),
            category: NodeCategory::Input,
            label: "Ollama Connector".to_string(),
            description: "Connects to a configured Ollama server and selects a model".to_string(),
            inputs: vec![
                PortMetadata::required(Self::PORT_SERVER_NAME, "Server", PortDataType::Enum)
                    .with_options(config.server_names())
                    .with_default(serde_json::json!(config.default_server_name()))
                    .with_tooltip("Ollama Server"),
                PortMetadata::required(Self::PORT_MODEL, "Model", PortDataType::String)
                    .with_default(serde_json::json!(REFRESH_MODEL))
                    .with_tooltip("Select Model (options managed by the model dropdown)"),
                PortMetadata::required(Self::PORT_TIMEOUT, "Timeout", PortDataType::Int)
                    .with_default(serde_json::json!(30))
                    .with_range(5.0, 300.0)
                    .with_tooltip("Request Timeout (seconds)"),
            ],
            outputs: vec![PortMetadata::required(
                Self::PORT_CONNECTION,
                "Connection",
                PortDataType::Connection,
            )],
            execution_mode: ExecutionMode::Reactive,
        }
    }
}

inventory::submit!(node_engine::DescriptorFn(OllamaConnectorTask::descriptor));

#[async_trait]
impl Task for OllamaConnectorTask {
    fn id(&self) -> &str {
        &self.task_id
    }

    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let config = ServerConfig::load(&self.config_path);

        let info = match self.read_inputs(&context, &config).await {
            Ok(inputs) => self.connect(&inputs, &config).await,
            Err(e) => {
                log::error!("OllamaConnectorTask {}: {}", self.task_id, e);
                ConnectionInfo::failure(
                    &config.default_server_name(),
                    &config.default_server_url(),
                    REFRESH_MODEL,
                    inference::constants::defaults::TIMEOUT_SECS,
                    e.to_string(),
                )
            }
        };

        let summary = match info.connection_status {
            ConnectionStatus::Connected => format!(
                "Connected to {} ({} models, using '{}')",
                info.server_url, info.available_models_count, info.selected_model
            ),
            ConnectionStatus::Failed => format!("Failed to connect to {}", info.server_url),
            ConnectionStatus::Error => info.error.clone().unwrap_or_default(),
        };

        let output_key = ContextKeys::output(&self.task_id, Self::PORT_CONNECTION);
        context.set(&output_key, info).await;

        log::debug!("OllamaConnectorTask {}: {}", self.task_id, summary);

        Ok(TaskResult::new(Some(summary), NextAction::Continue))
    }
}

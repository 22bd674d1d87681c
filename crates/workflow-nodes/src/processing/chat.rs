//! Ollama Chat Task
//!
//! Multi-turn chat against the model chosen by a connector node. Each task
//! instance owns its conversation history.

use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use inference::{ChatMessage, ConnectionInfo, OllamaClient};
use node_engine::{
    ContextKeys, ExecutionMode, NodeCategory, NodeEngineError, PortDataType, PortMetadata,
    TaskDescriptor, TaskMetadata,
};
use parking_lot::Mutex;

use super::language::Language;
use crate::context_io::{read_float, read_input, read_int, require_input};

/// Ollama Chat Task
///
/// Sends `[system instruction] + history + message` and appends the user
/// message and the reply to the history when the turn succeeds. A failed
/// turn leaves the history untouched and outputs the error message.
/// Overlapping runs of one instance (or its clones) take turns, so each
/// request sees the history left by the previous one.
///
/// # Inputs (from context)
/// - `{task_id}.input.message` (required) - The user message
/// - `{task_id}.input.clear_history` (optional) - Empty the history before this turn
/// - `{task_id}.input.connection` (optional) - `ConnectionInfo` from a connector
/// - `{task_id}.input.temperature` (optional) - Sampling temperature (default: 0.7)
/// - `{task_id}.input.max_tokens` (optional) - Token limit (default: 4096)
/// - `{task_id}.input.language` (optional) - `中文` or `English`
///
/// # Outputs (to context)
/// - `{task_id}.output.response` - The reply, or an error message
#[derive(Clone)]
pub struct OllamaChatTask {
    /// Unique identifier for this task instance
    task_id: String,
    /// User and assistant turns; the system message is not stored
    history: Arc<Mutex<Vec<ChatMessage>>>,
    /// Held for a whole turn, across the request
    turn: Arc<tokio::sync::Mutex<()>>,
}

impl OllamaChatTask {
    /// Port ID for message input
    pub const PORT_MESSAGE: &'static str = "message";
    /// Port ID for clear history input
    pub const PORT_CLEAR_HISTORY: &'static str = "clear_history";
    /// Port ID for connection input
    pub const PORT_CONNECTION: &'static str = "connection";
    /// Port ID for temperature input
    pub const PORT_TEMPERATURE: &'static str = "temperature";
    /// Port ID for max tokens input
    pub const PORT_MAX_TOKENS: &'static str = "max_tokens";
    /// Port ID for language input
    pub const PORT_LANGUAGE: &'static str = "language";
    /// Port ID for response output
    pub const PORT_RESPONSE: &'static str = "response";

    /// Create a new chat task with an empty history
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            history: Arc::new(Mutex::new(Vec::new())),
            turn: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Get the task ID
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Snapshot of the conversation history
    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().clone()
    }

    async fn respond(&self, context: &Context) -> node_engine::Result<String> {
        let message: String = require_input(context, &self.task_id, Self::PORT_MESSAGE).await?;
        let clear_history: bool = read_input(context, &self.task_id, Self::PORT_CLEAR_HISTORY)
            .await?
            .unwrap_or(false);
        let connection: Option<ConnectionInfo> =
            read_input(context, &self.task_id, Self::PORT_CONNECTION).await?;
        let temperature = read_float(context, &self.task_id, Self::PORT_TEMPERATURE)
            .await?
            .unwrap_or(0.7);
        let max_tokens = read_int(context, &self.task_id, Self::PORT_MAX_TOKENS)
            .await?
            .unwrap_or(4096);
        let language: Option<String> =
            read_input(context, &self.task_id, Self::PORT_LANGUAGE).await?;
        let language = language.map(|l| Language::from_label(&l)).unwrap_or_default();

        let _turn = self.turn.lock().await;

        if clear_history {
            log::debug!("OllamaChatTask {}: clearing history", self.task_id);
            self.history.lock().clear();
        }

        let mut client = match &connection {
            Some(info) => OllamaClient::from_connection_info(info),
            None => OllamaClient::default(),
        };

        let user = ChatMessage::user(message);
        let mut messages = vec![ChatMessage::system(language.chat_instruction())];
        messages.extend(self.history.lock().iter().cloned());
        messages.push(user.clone());

        let outcome = client
            .chat(messages, temperature, max_tokens)
            .await
            .map_err(|e| NodeEngineError::Inference(e.to_string()))?;

        let mut history = self.history.lock();
        history.push(user);
        history.push(ChatMessage::assistant(outcome.text.clone()));
        log::debug!(
            "OllamaChatTask {}: {} ({} history entries)",
            self.task_id,
            outcome.status,
            history.len()
        );

        Ok(outcome.text)
    }
}

impl TaskDescriptor for OllamaChatTask {
    fn descriptor() -> TaskMetadata {
        TaskMetadata {
            node_type: "ollama-chat".to_string(),
            category: NodeCategory::Processing,
            label: "Ollama Chat".to_string(),
            description: "Multi-turn chat with an Ollama model".to_string(),
            inputs: vec![
                PortMetadata::required(Self::PORT_MESSAGE, "Message", PortDataType::String)
                    .with_default(serde_json::json!("Hello!"))
                    .multiline()
                    .with_tooltip("User Message"),
                PortMetadata::required(
                    Self::PORT_CLEAR_HISTORY,
                    "Clear History",
                    PortDataType::Boolean,
                )
                .with_default(serde_json::json!(false)),
                PortMetadata::optional(
                    Self::PORT_CONNECTION,
                    "Connection",
                    PortDataType::Connection,
                ),
                PortMetadata::optional(Self::PORT_TEMPERATURE, "Temperature", PortDataType::Float)
                    .with_default(serde_json::json!(0.7))
                    .with_range(0.1, 1.0)
                    .with_step(0.1),
                PortMetadata::optional(Self::PORT_MAX_TOKENS, "Max Tokens", PortDataType::Int)
                    .with_default(serde_json::json!(4096))
                    .with_range(1024.0, 32768.0),
                PortMetadata::optional(Self::PORT_LANGUAGE, "Language", PortDataType::Enum)
                    .with_options(Language::OPTIONS)
                    .with_default(serde_json::json!(Language::default().label())),
            ],
            outputs: vec![PortMetadata::required(
                Self::PORT_RESPONSE,
                "Response",
                PortDataType::String,
            )],
            execution_mode: ExecutionMode::Batch,
        }
    }
}

inventory::submit!(node_engine::DescriptorFn(OllamaChatTask::descriptor));

#[async_trait]
impl Task for OllamaChatTask {
    fn id(&self) -> &str {
        &self.task_id
    }

    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let response = match self.respond(&context).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("OllamaChatTask {}: {}", self.task_id, e);
                e.to_string()
            }
        };

        let output_key = ContextKeys::output(&self.task_id, Self::PORT_RESPONSE);
        context.set(&output_key, response.clone()).await;

        Ok(TaskResult::new(Some(response), NextAction::Continue))
    }
}

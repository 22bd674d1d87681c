//! Ollama Vision Task
//!
//! Describes one or more images with a vision-capable model. The incoming
//! tensor batch is split into single frames and sent in one request.

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use inference::{ConnectionInfo, ImagePayload, ImageTensor, OllamaClient};
use node_engine::{
    ContextKeys, ExecutionMode, NodeCategory, NodeEngineError, PortDataType, PortMetadata,
    TaskDescriptor, TaskMetadata,
};

use super::language::Language;
use crate::context_io::{publish_text, read_float, read_input, read_int, require_input};

/// Default prompt when none is wired in
pub const DEFAULT_PROMPT: &str = "Please describe the content of these images in detail";

/// Temperature ceiling for multi-image requests
const MULTI_IMAGE_MAX_TEMPERATURE: f64 = 1.0;
/// Token ceiling for multi-image requests
const MULTI_IMAGE_MAX_TOKENS: i64 = 8192;

/// Ollama Vision Task
///
/// # Inputs (from context)
/// - `{task_id}.input.connection` (required) - `ConnectionInfo` from a connector
/// - `{task_id}.input.images` (required) - Image tensor, one or more frames
/// - `{task_id}.input.prompt` (optional) - Question about the images
/// - `{task_id}.input.temperature` (optional) - Sampling temperature (default: 0.7)
/// - `{task_id}.input.max_tokens` (optional) - Token limit (default: 4096)
/// - `{task_id}.input.language` (optional) - `中文` or `English`
///
/// # Outputs (to context)
/// - `{task_id}.output.response` - The description, or an error message
/// - `{task_id}.stream.response` - The same text for display
#[derive(Clone)]
pub struct OllamaVisionTask {
    /// Unique identifier for this task instance
    task_id: String,
}

impl OllamaVisionTask {
    /// Port ID for connection input
    pub const PORT_CONNECTION: &'static str = "connection";
    /// Port ID for images input
    pub const PORT_IMAGES: &'static str = "images";
    /// Port ID for prompt input
    pub const PORT_PROMPT: &'static str = "prompt";
    /// Port ID for temperature input
    pub const PORT_TEMPERATURE: &'static str = "temperature";
    /// Port ID for max tokens input
    pub const PORT_MAX_TOKENS: &'static str = "max_tokens";
    /// Port ID for language input
    pub const PORT_LANGUAGE: &'static str = "language";
    /// Port ID for response output
    pub const PORT_RESPONSE: &'static str = "response";

    /// Create a new vision task
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }

    /// Get the task ID
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    async fn describe(&self, context: &Context) -> node_engine::Result<String> {
        let connection: ConnectionInfo =
            require_input(context, &self.task_id, Self::PORT_CONNECTION).await?;
        let images: ImageTensor = require_input(context, &self.task_id, Self::PORT_IMAGES).await?;
        let prompt: String = read_input(context, &self.task_id, Self::PORT_PROMPT)
            .await?
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string());
        let temperature = read_float(context, &self.task_id, Self::PORT_TEMPERATURE)
            .await?
            .unwrap_or(0.7);
        let max_tokens = read_int(context, &self.task_id, Self::PORT_MAX_TOKENS)
            .await?
            .unwrap_or(4096);
        let language: Option<String> =
            read_input(context, &self.task_id, Self::PORT_LANGUAGE).await?;
        let language = language.map(|l| Language::from_label(&l)).unwrap_or_default();

        if images.is_empty() {
            return Err(NodeEngineError::invalid(Self::PORT_IMAGES, "image batch is empty"));
        }
        if !matches!(images.channels(), 1 | 3 | 4) {
            return Err(NodeEngineError::invalid(
                Self::PORT_IMAGES,
                format!("unsupported channel count {}", images.channels()),
            ));
        }

        let frames: Vec<ImagePayload> = images.split().into_iter().map(ImagePayload::from).collect();
        let (temperature, max_tokens) = tighten_for_batch(temperature, max_tokens, frames.len());
        log::info!(
            "OllamaVisionTask {}: {} image(s) of {}x{}",
            self.task_id,
            frames.len(),
            images.width(),
            images.height()
        );

        let mut client = OllamaClient::from_connection_info(&connection);
        let completion = client
            .analyze_multiple_images(
                &prompt,
                &frames,
                &language.vision_instruction(),
                temperature,
                max_tokens,
            )
            .await
            .map_err(|e| NodeEngineError::Inference(e.to_string()))?;
        log::debug!("OllamaVisionTask {}: {}", self.task_id, completion.status);

        Ok(completion.text)
    }
}

/// Clamp widget values, then tighten them when several frames go in one request
fn tighten_for_batch(temperature: f64, max_tokens: i64, frames: usize) -> (f64, i64) {
    let temperature = if temperature.is_nan() {
        0.0
    } else {
        temperature.clamp(0.0, 2.0)
    };
    let max_tokens = max_tokens.clamp(1, 32768);
    if frames > 1 {
        (
            temperature.min(MULTI_IMAGE_MAX_TEMPERATURE),
            max_tokens.min(MULTI_IMAGE_MAX_TOKENS),
        )
    } else {
        (temperature, max_tokens)
    }
}

impl TaskDescriptor for OllamaVisionTask {
    fn descriptor() -> TaskMetadata {
        TaskMetadata {
            node_type: "ollama-vision".to_string(),
            category: NodeCategory::Processing,
            label: "Ollama Vision".to_string(),
            description: "Describes images with an Ollama vision model".to_string(),
            inputs: vec![
                PortMetadata::required(
                    Self::PORT_CONNECTION,
                    "Connection",
                    PortDataType::Connection,
                ),
                PortMetadata::required(Self::PORT_IMAGES, "Images", PortDataType::Image),
                PortMetadata::optional(Self::PORT_PROMPT, "Prompt", PortDataType::String)
                    .with_default(serde_json::json!(DEFAULT_PROMPT))
                    .multiline(),
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

inventory::submit!(node_engine::DescriptorFn(OllamaVisionTask::descriptor));

#[async_trait]
impl Task for OllamaVisionTask {
    fn id(&self) -> &str {
        &self.task_id
    }

    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let response = match self.describe(&context).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("OllamaVisionTask {}: {}", self.task_id, e);
                format!("Multi-Image Analysis Failed: {}", e)
            }
        };

        let output_key = ContextKeys::output(&self.task_id, Self::PORT_RESPONSE);
        context.set(&output_key, response.clone()).await;
        publish_text(
            &context,
            &self.task_id,
            Self::PORT_RESPONSE,
            serde_json::json!(response),
        )
        .await;

        Ok(TaskResult::new(Some(response), NextAction::Continue))
    }
}

//! Ollama HTTP client adapter
//!
//! Wraps the Ollama REST API (`/api/tags`, `/api/generate`, `/api/chat`)
//! behind a small set of operations. Every operation clamps its sampling
//! parameters, probes the server lazily when no probe has succeeded yet, and
//! returns failures as [`InferenceError`] values whose `Display` is the
//! message shown to the user.

use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionInfo, ConnectionStatus};
use crate::constants::{defaults, limits};
use crate::error::InferenceError;
use crate::images::{ImagePayload, ImageTransport, PreparedImage};
use crate::params::{clamp_max_tokens, clamp_multi_image_temperature, clamp_temperature, clamp_timeout};

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[a-zA-Z0-9.-]+(:\d{1,5})?$").expect("URL pattern is a valid regex")
});

/// Substrings that mark a model name as vision-capable
const VISION_MODEL_KEYWORDS: &[&str] = &[
    "vision",
    "vl",
    "multimodal",
    "llava",
    "bakllava",
    "moondream",
    "qwen2-vl",
    "qwen-vl",
    "llama3.2-vision",
    "minicpm-v",
    "cogvlm",
    "internvl",
    "xverse-v",
];

/// Known vision model tags
const VISION_MODELS_EXACT: &[&str] = &[
    "llava:latest",
    "llava:13b",
    "llava:34b",
    "llava:7b",
    "bakllava:latest",
    "moondream:latest",
    "qwen2-vl:latest",
    "qwen2-vl:7b",
    "qwen2-vl:2b",
    "llama3.2-vision:latest",
    "llama3.2-vision:11b",
    "llama3.2-vision:90b",
];

/// Check whether a model name denotes a vision-capable model
pub fn is_vision_model(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let lower = name.to_lowercase();
    VISION_MODELS_EXACT.iter().any(|m| *m == lower)
        || VISION_MODEL_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(InferenceError::InvalidRole(other.to_string())),
        }
    }
}

/// A single chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Base64 images attached to this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// Create a message from an untyped role string
    pub fn try_new(role: &str, content: impl Into<String>) -> Result<Self, InferenceError> {
        Ok(Self::new(role.parse()?, content))
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// Validate untyped `{role, content}` records into chat messages
pub fn parse_messages(values: &[serde_json::Value]) -> Result<Vec<ChatMessage>, InferenceError> {
    if values.is_empty() {
        return Err(InferenceError::EmptyMessages);
    }
    values
        .iter()
        .map(|value| {
            let role = value
                .get("role")
                .and_then(|r| r.as_str())
                .ok_or(InferenceError::InvalidMessageFormat)?;
            let content = value
                .get("content")
                .and_then(|c| c.as_str())
                .ok_or(InferenceError::InvalidMessageFormat)?;
            ChatMessage::try_new(role, content)
        })
        .collect()
}

/// Text produced by a single-shot request
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Human-readable summary of the request
    pub status: String,
}

/// Result of a chat request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub text: String,
    pub status: String,
    /// The request messages followed by the assistant reply
    pub messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct RequestOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: RequestOptions,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: RequestOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    model: String,
}

/// Client for one Ollama server and model
///
/// Holds the result of the last connectivity probe. The model list is only
/// trusted right after a successful probe.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    server_url: String,
    model: String,
    timeout_secs: u64,
    transport: ImageTransport,
    connected: bool,
    available_models: Vec<String>,
}

impl OllamaClient {
    /// Create a client; the URL is normalized and the timeout clamped to 5-300 s
    pub fn new(
        server_url: &str,
        model: impl Into<String>,
        timeout_secs: i64,
        transport: ImageTransport,
    ) -> Self {
        let timeout_secs = clamp_timeout(timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Self {
            http,
            server_url: Self::normalize_server_url(server_url),
            model: model.into(),
            timeout_secs,
            transport,
            connected: false,
            available_models: Vec::new(),
        }
    }

    /// Normalize a user-entered server URL
    ///
    /// Strips trailing slashes and adds `http://` when no scheme is given.
    /// Anything that is not `scheme://host[:port]` falls back to the default.
    pub fn normalize_server_url(url: &str) -> String {
        let trimmed = url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return defaults::SERVER_URL.to_string();
        }

        let url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        if URL_PATTERN.is_match(&url) {
            url
        } else {
            log::warn!("Invalid URL format '{}', using default", url);
            defaults::SERVER_URL.to_string()
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn transport(&self) -> ImageTransport {
        self.transport
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn available_models(&self) -> &[String] {
        &self.available_models
    }

    /// Whether the current model accepts images
    pub fn supports_vision(&self) -> bool {
        is_vision_model(&self.model)
    }

    /// Probe the server and refresh the model list
    ///
    /// On any failure the client is marked disconnected with no models.
    pub async fn test_connection(&mut self) -> bool {
        log::info!("Testing connection to: {}", self.server_url);

        match self.fetch_models().await {
            Ok(models) => {
                log::info!("Connection successful. Found {} models", models.len());
                if !models.is_empty() {
                    let shown = models.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
                    if models.len() > 5 {
                        log::debug!("Available models: {} and {} more", shown, models.len() - 5);
                    } else {
                        log::debug!("Available models: {}", shown);
                    }
                }
                self.available_models = models;
                self.connected = true;
                true
            }
            Err(e) => {
                log::warn!("Connection to {} failed: {}", self.server_url, e);
                self.connected = false;
                self.available_models.clear();
                false
            }
        }
    }

    async fn fetch_models(&self) -> Result<Vec<String>, InferenceError> {
        let url = format!("{}/api/tags", self.server_url);
        let response = self.http.get(&url).send().await?;
        let response = Self::check_status(response).await?;
        let tags: TagsResponse = response.json().await?;

        Ok(tags
            .models
            .into_iter()
            .map(|entry| if entry.name.is_empty() { entry.model } else { entry.name })
            .filter(|name| !name.is_empty())
            .collect())
    }

    /// Probe lazily and require at least one model
    async fn ensure_ready(&mut self) -> Result<(), InferenceError> {
        if !self.connected && !self.test_connection().await {
            return Err(InferenceError::ConnectionFailed);
        }
        if self.available_models.is_empty() {
            return Err(InferenceError::NoModels);
        }
        Ok(())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, InferenceError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        // Ollama reports failures as {"error": "..."}
        let body = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(body);
        Err(InferenceError::Api { status, body })
    }

    /// Single-shot text generation
    pub async fn generate_text(
        &mut self,
        prompt: &str,
        system_prompt: &str,
        temperature: f64,
        max_tokens: i64,
    ) -> Result<Completion, InferenceError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(InferenceError::EmptyPrompt);
        }
        let options = RequestOptions {
            temperature: clamp_temperature(temperature),
            num_predict: clamp_max_tokens(max_tokens),
        };

        self.ensure_ready().await?;
        log::info!("Generating text with model: {}", self.model);

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            system: system_prompt.trim(),
            stream: false,
            options,
        };
        let url = format!("{}/api/generate", self.server_url);
        let response = self.http.post(&url).json(&request).send().await?;
        let response: GenerateResponse = Self::check_status(response).await?.json().await?;

        if response.response.is_empty() {
            return Err(InferenceError::EmptyResponse);
        }
        Ok(Completion {
            status: format!(
                "Successfully generated {} characters",
                response.response.chars().count()
            ),
            text: response.response,
        })
    }

    /// Send a conversation and return the reply with the extended history
    pub async fn chat(
        &mut self,
        messages: Vec<ChatMessage>,
        temperature: f64,
        max_tokens: i64,
    ) -> Result<ChatOutcome, InferenceError> {
        if messages.is_empty() {
            return Err(InferenceError::EmptyMessages);
        }
        let temperature = clamp_temperature(temperature);
        let max_tokens = clamp_max_tokens(max_tokens);

        self.ensure_ready().await?;
        log::info!(
            "Chat request with {} messages using model: {}",
            messages.len(),
            self.model
        );

        let text = self.post_chat(&messages, temperature, max_tokens).await?;
        if text.is_empty() {
            return Err(InferenceError::EmptyResponse);
        }

        let status = format!("Chat successful: {} characters generated", text.chars().count());
        let mut messages = messages;
        messages.push(ChatMessage::assistant(text.clone()));
        Ok(ChatOutcome {
            text,
            status,
            messages,
        })
    }

    /// [`chat`](Self::chat) over untyped `{role, content}` records
    ///
    /// Records are validated before the server is contacted.
    pub async fn chat_raw(
        &mut self,
        messages: &[serde_json::Value],
        temperature: f64,
        max_tokens: i64,
    ) -> Result<ChatOutcome, InferenceError> {
        let messages = parse_messages(messages)?;
        self.chat(messages, temperature, max_tokens).await
    }

    /// Describe one image
    pub async fn analyze_image(
        &mut self,
        prompt: &str,
        image: &ImagePayload,
        system_prompt: &str,
        temperature: f64,
        max_tokens: i64,
    ) -> Result<Completion, InferenceError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(InferenceError::EmptyPrompt);
        }
        if !self.supports_vision() {
            return Err(InferenceError::NotVisionModel(self.model.clone()));
        }
        let temperature = clamp_temperature(temperature);
        let max_tokens = clamp_max_tokens(max_tokens);

        self.ensure_ready().await?;

        let prepared = PreparedImage::prepare(image, self.transport)?;
        log::info!(
            "Analyzing image with model: {} (format: {})",
            self.model,
            if self.transport.use_base64() { "base64" } else { "file path" }
        );

        let text = self
            .post_vision(prompt, system_prompt, &[prepared], temperature, max_tokens)
            .await?;
        Ok(Completion {
            text,
            status: "Successfully analyzed image".to_string(),
        })
    }

    /// Describe up to ten images in one request
    ///
    /// Images that fail to convert are skipped; the request fails only when
    /// none convert.
    pub async fn analyze_multiple_images(
        &mut self,
        prompt: &str,
        images: &[ImagePayload],
        system_prompt: &str,
        temperature: f64,
        max_tokens: i64,
    ) -> Result<Completion, InferenceError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(InferenceError::EmptyPrompt);
        }
        if images.is_empty() {
            return Err(InferenceError::NoImages);
        }
        if !self.supports_vision() {
            return Err(InferenceError::NotVisionModel(self.model.clone()));
        }
        let temperature = clamp_multi_image_temperature(temperature);
        let max_tokens = clamp_max_tokens(max_tokens);
        if images.len() > limits::MAX_IMAGES {
            return Err(InferenceError::TooManyImages {
                count: images.len(),
                max: limits::MAX_IMAGES,
            });
        }

        self.ensure_ready().await?;

        let mut prepared = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            match PreparedImage::prepare(image, self.transport) {
                Ok(image) => prepared.push(image),
                Err(e) => log::warn!("Skipping image {}: {}", index + 1, e),
            }
        }
        if prepared.is_empty() {
            return Err(InferenceError::NoPreparedImages);
        }
        log::info!(
            "Analyzing {} images with model: {}",
            prepared.len(),
            self.model
        );

        let text = self
            .post_vision(prompt, system_prompt, &prepared, temperature, max_tokens)
            .await?;
        Ok(Completion {
            text,
            status: format!("Successfully analyzed {} images", prepared.len()),
        })
    }

    async fn post_vision(
        &self,
        prompt: &str,
        system_prompt: &str,
        images: &[PreparedImage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, InferenceError> {
        let mut encoded = Vec::with_capacity(images.len());
        for image in images {
            encoded.push(image.to_wire().await?);
        }

        let messages = [
            ChatMessage::system(system_prompt.trim()),
            ChatMessage::user(prompt).with_images(encoded),
        ];
        let text = self.post_chat(&messages, temperature, max_tokens).await?;
        if text.is_empty() {
            return Err(InferenceError::EmptyVisionResponse);
        }
        Ok(text)
    }

    async fn post_chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, InferenceError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: RequestOptions {
                temperature,
                num_predict: max_tokens,
            },
        };
        let url = format!("{}/api/chat", self.server_url);
        let response = self.http.post(&url).json(&request).send().await?;
        let response: ChatResponse = Self::check_status(response).await?.json().await?;

        Ok(response.message.map(|m| m.content).unwrap_or_default())
    }

    /// Snapshot this client as a connection payload
    pub fn to_connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            server_url: self.server_url.clone(),
            model: self.model.clone(),
            timeout: self.timeout_secs,
            use_base64: self.transport.use_base64(),
            available_models: self.available_models.clone(),
            connected: self.connected,
            selected_model: self.model.clone(),
            connection_status: if self.connected {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Failed
            },
            available_models_count: self.available_models.len(),
            ..ConnectionInfo::default()
        }
    }

    /// Restore a client, including its probe result, from a payload
    pub fn from_connection_info(info: &ConnectionInfo) -> Self {
        let mut client = Self::new(
            &info.server_url,
            info.model.clone(),
            i64::try_from(info.timeout).unwrap_or(i64::MAX),
            ImageTransport::from_use_base64(info.use_base64),
        );
        client.connected = info.connected;
        client.available_models = info.available_models.clone();
        client
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(
            defaults::SERVER_URL,
            defaults::MODEL,
            defaults::TIMEOUT_SECS as i64,
            ImageTransport::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageTensor;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    async fn mock_ollama(models: &[&str]) -> MockServer {
        let server = MockServer::start().await;
        let entries: Vec<_> = models.iter().map(|m| json!({ "name": m, "model": m })).collect();
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": entries })))
            .mount(&server)
            .await;
        server
    }

    async fn mount_chat_reply(server: &MockServer, content: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llava:7b",
                "message": { "role": "assistant", "content": content },
                "done": true
            })))
            .expect(times)
            .mount(server)
            .await;
    }

    fn tiny_image() -> ImagePayload {
        ImagePayload::Pixels(ImageTensor::new([1, 2, 2, 3], vec![0.5; 12]).unwrap())
    }

    #[test]
    fn test_normalize_server_url() {
        assert_eq!(
            OllamaClient::normalize_server_url("127.0.0.1:11434/"),
            "http://127.0.0.1:11434"
        );
        assert_eq!(
            OllamaClient::normalize_server_url("https://ollama.example.com"),
            "https://ollama.example.com"
        );
        assert_eq!(
            OllamaClient::normalize_server_url("http://host:11434/api"),
            "http://127.0.0.1:11434"
        );
        assert_eq!(OllamaClient::normalize_server_url(""), "http://127.0.0.1:11434");
    }

    #[test]
    fn test_is_vision_model() {
        assert!(is_vision_model("llava:7b"));
        assert!(is_vision_model("LLaVA:13B"));
        assert!(is_vision_model("qwen2.5vl:7b"));
        assert!(is_vision_model("llama3.2-vision:11b"));
        assert!(!is_vision_model("llama3:8b"));
        assert!(!is_vision_model(""));
    }

    #[test]
    fn test_timeout_clamped_on_construction() {
        let client = OllamaClient::new("localhost:11434", "llama3", 1, ImageTransport::Embedded);
        assert_eq!(client.timeout_secs(), 5);
        assert_eq!(client.server_url(), "http://localhost:11434");
    }

    #[test]
    fn test_parse_messages() {
        let ok = parse_messages(&[
            json!({"role": "system", "content": "be brief"}),
            json!({"role": "user", "content": "hi"}),
        ])
        .unwrap();
        assert_eq!(ok[1], ChatMessage::user("hi"));

        assert!(matches!(parse_messages(&[]), Err(InferenceError::EmptyMessages)));
        assert!(matches!(
            parse_messages(&[json!({"role": "user"})]),
            Err(InferenceError::InvalidMessageFormat)
        ));
        assert!(matches!(
            ChatMessage::try_new("wizard", "hi"),
            Err(InferenceError::InvalidRole(role)) if role == "wizard"
        ));
    }

    #[tokio::test]
    async fn test_connection_populates_models() {
        init_logging();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [
                    { "name": "llama3:8b" },
                    { "model": "llava:7b" },
                    { "name": "" }
                ]
            })))
            .mount(&server)
            .await;

        let mut client = OllamaClient::new(&server.uri(), "llama3:8b", 30, ImageTransport::Embedded);
        assert!(client.test_connection().await);
        assert!(client.connected());
        assert_eq!(client.available_models(), &["llama3:8b", "llava:7b"]);
    }

    #[tokio::test]
    async fn test_connection_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = OllamaClient::new(
            &format!("http://127.0.0.1:{}", port),
            "llama3",
            5,
            ImageTransport::Embedded,
        );
        assert!(!client.test_connection().await);
        assert!(!client.connected());
        assert!(client.available_models().is_empty());
    }

    #[tokio::test]
    async fn test_connection_failure_clears_previous_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let info = ConnectionInfo {
            server_url: server.uri(),
            connected: true,
            available_models: vec!["stale:latest".to_string()],
            ..ConnectionInfo::default()
        };
        let mut client = OllamaClient::from_connection_info(&info);
        assert!(!client.test_connection().await);
        assert!(client.available_models().is_empty());
    }

    #[tokio::test]
    async fn test_generate_clamps_parameters() {
        let server = mock_ollama(&["llama3:8b"]).await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": "llama3:8b",
                "prompt": "Say hi",
                "stream": false,
                "options": { "temperature": 2.0, "num_predict": 8192 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "hi" })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = OllamaClient::new(&server.uri(), "llama3:8b", 30, ImageTransport::Embedded);
        let completion = client
            .generate_text("  Say hi ", defaults::SYSTEM_PROMPT, 9.5, 100_000)
            .await
            .unwrap();

        assert_eq!(completion.text, "hi");
        assert_eq!(completion.status, "Successfully generated 2 characters");
    }

    #[tokio::test]
    async fn test_generate_empty_prompt() {
        let mut client = OllamaClient::default();
        let err = client.generate_text("   ", "", 0.7, 100).await.unwrap_err();
        assert!(matches!(err, InferenceError::EmptyPrompt));
    }

    #[tokio::test]
    async fn test_no_models_available() {
        let server = mock_ollama(&[]).await;
        let mut client = OllamaClient::new(&server.uri(), "llama3", 30, ImageTransport::Embedded);

        let err = client
            .chat(vec![ChatMessage::user("hi")], 0.7, 100)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Error: No models available on server");
    }

    #[tokio::test]
    async fn test_chat_appends_assistant_reply() {
        let server = mock_ollama(&["llama3:8b"]).await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "messages": [
                    { "role": "system", "content": "Please use English for conversation." },
                    { "role": "user", "content": "Hello!" }
                ],
                "options": { "num_predict": 1 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": { "role": "assistant", "content": "Hi there" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = OllamaClient::new(&server.uri(), "llama3:8b", 30, ImageTransport::Embedded);
        let messages = vec![
            ChatMessage::system("Please use English for conversation."),
            ChatMessage::user("Hello!"),
        ];
        let outcome = client.chat(messages, 0.7, 0).await.unwrap();

        assert_eq!(outcome.text, "Hi there");
        assert_eq!(outcome.messages.len(), 3);
        assert_eq!(outcome.messages[2], ChatMessage::assistant("Hi there"));
        assert_eq!(outcome.status, "Chat successful: 8 characters generated");
    }

    #[tokio::test]
    async fn test_chat_invalid_role_rejected_before_network() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut client = OllamaClient::new(&server.uri(), "llama3:8b", 30, ImageTransport::Embedded);
        let err = client
            .chat_raw(
                &[
                    json!({"role": "user", "content": "hi"}),
                    json!({"role": "wizard", "content": "abracadabra"}),
                ],
                0.7,
                100,
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Error: Invalid role 'wizard'");
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_chat_api_error() {
        let server = mock_ollama(&["llama3:8b"]).await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "error": "model 'llama3:8b' not found" })),
            )
            .mount(&server)
            .await;

        let mut client = OllamaClient::new(&server.uri(), "llama3:8b", 30, ImageTransport::Embedded);
        let err = client
            .chat(vec![ChatMessage::user("hi")], 0.7, 100)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Ollama API error: 404: model 'llama3:8b' not found");
    }

    #[tokio::test]
    async fn test_chat_empty_response() {
        let server = mock_ollama(&["llama3:8b"]).await;
        mount_chat_reply(&server, "", 1).await;

        let mut client = OllamaClient::new(&server.uri(), "llama3:8b", 30, ImageTransport::Embedded);
        let err = client
            .chat(vec![ChatMessage::user("hi")], 0.7, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_analyze_image_requires_vision_model() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut client = OllamaClient::new(&server.uri(), "llama3:8b", 30, ImageTransport::Embedded);
        let err = client
            .analyze_image("What is this?", &tiny_image(), "", 0.7, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::NotVisionModel(_)));
    }

    #[tokio::test]
    async fn test_analyze_image_with_temp_file_transport() {
        let server = mock_ollama(&["llava:7b"]).await;
        mount_chat_reply(&server, "A grey square", 1).await;

        let mut client = OllamaClient::new(&server.uri(), "llava:7b", 30, ImageTransport::TempFile);
        let completion = client
            .analyze_image("What is this?", &tiny_image(), defaults::SYSTEM_PROMPT, 0.7, 100)
            .await
            .unwrap();

        assert_eq!(completion.text, "A grey square");
        assert_eq!(completion.status, "Successfully analyzed image");

        let requests = server.received_requests().await.unwrap();
        let chat = requests.iter().find(|r| r.url.path() == "/api/chat").unwrap();
        let body: serde_json::Value = serde_json::from_slice(&chat.body).unwrap();
        assert_eq!(body["messages"][1]["images"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_eleven_images_rejected() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut client = OllamaClient::new(&server.uri(), "llava:7b", 30, ImageTransport::Embedded);
        let images = vec![tiny_image(); 11];
        let err = client
            .analyze_multiple_images("Compare", &images, "", 0.7, 100)
            .await
            .unwrap_err();

        assert!(matches!(err, InferenceError::TooManyImages { count: 11, max: 10 }));
    }

    #[tokio::test]
    async fn test_ten_images_accepted() {
        let server = mock_ollama(&["llava:7b"]).await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({ "options": { "temperature": 1.0 } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": { "role": "assistant", "content": "Ten squares" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = OllamaClient::new(&server.uri(), "llava:7b", 30, ImageTransport::Embedded);
        let images = vec![tiny_image(); 10];
        let completion = client
            .analyze_multiple_images("Compare", &images, "", 1.8, 100)
            .await
            .unwrap();

        assert_eq!(completion.text, "Ten squares");
        assert_eq!(completion.status, "Successfully analyzed 10 images");
    }

    #[tokio::test]
    async fn test_unconvertible_images_skipped() {
        let server = mock_ollama(&["llava:7b"]).await;
        mount_chat_reply(&server, "One square", 1).await;

        let mut client = OllamaClient::new(&server.uri(), "llava:7b", 30, ImageTransport::Embedded);
        let images = vec![tiny_image(), ImagePayload::Base64("garbage".to_string())];
        let completion = client
            .analyze_multiple_images("Compare", &images, "", 0.7, 100)
            .await
            .unwrap();
        assert_eq!(completion.status, "Successfully analyzed 1 images");

        let only_bad = vec![ImagePayload::Base64("garbage".to_string())];
        let err = client
            .analyze_multiple_images("Compare", &only_bad, "", 0.7, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::NoPreparedImages));
    }

    #[tokio::test]
    async fn test_connection_info_skips_reprobe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        mount_chat_reply(&server, "cached", 1).await;

        let info = ConnectionInfo {
            server_url: server.uri(),
            model: "llava:7b".to_string(),
            connected: true,
            available_models: vec!["llava:7b".to_string()],
            ..ConnectionInfo::default()
        };
        let mut client = OllamaClient::from_connection_info(&info);
        assert_eq!(client.transport(), ImageTransport::TempFile);

        let outcome = client
            .chat(vec![ChatMessage::user("hi")], 0.7, 100)
            .await
            .unwrap();
        assert_eq!(outcome.text, "cached");

        let snapshot = client.to_connection_info();
        assert_eq!(snapshot.server_url, server.uri());
        assert_eq!(snapshot.connection_status, ConnectionStatus::Connected);
        assert_eq!(snapshot.available_models_count, 1);
    }
}

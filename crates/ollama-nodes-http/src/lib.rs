//! HTTP endpoints for the node front-end
//!
//! Lets the UI list the models of a server without running a workflow:
//! - `POST /ollama/get_models` - probe a server by URL
//! - `POST /ollama/get_models_by_name` - probe a configured server by name
//! - `GET /ollama/node_definitions` - metadata of every registered node

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use inference::constants::defaults;
use inference::{ImageTransport, OllamaClient, ServerConfig};
use node_engine::{NodeRegistry, TaskMetadata};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

// Linked for the node descriptors it submits to the registry.
extern crate workflow_nodes;

/// Environment variable for the listen address
pub const ADDR_ENV: &str = "OLLAMA_NODES_ADDR";

/// Listen address used when the environment variable is unset
pub const DEFAULT_ADDR: &str = "127.0.0.1:8189";

/// Shared state for the handlers
#[derive(Clone)]
pub struct AppState {
    /// Server list file, re-read on every request
    config_path: PathBuf,
    /// Node metadata collected at startup
    registry: Arc<NodeRegistry>,
}

impl AppState {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            registry: Arc::new(NodeRegistry::with_builtins()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(inference::config_path())
    }
}

/// Body of the model listing responses
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelsResponse {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// A node's metadata plus the menu it is listed under
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    #[serde(flatten)]
    pub metadata: TaskMetadata,
    pub menu_path: &'static str,
}

impl From<&TaskMetadata> for NodeDefinition {
    fn from(metadata: &TaskMetadata) -> Self {
        Self {
            menu_path: metadata.category.menu_path(),
            metadata: metadata.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GetModelsRequest {
    server_url: Option<String>,
}

/// Build the router with CORS open to the front-end
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ollama/get_models", post(get_models_handler))
        .route("/ollama/get_models_by_name", post(get_models_by_name_handler))
        .route("/ollama/node_definitions", get(node_definitions_handler))
        .layer(cors)
        .with_state(state)
}

/// Probe a server and list its models
async fn probe(server_url: &str) -> OllamaClient {
    let mut client = OllamaClient::new(
        server_url,
        defaults::MODEL,
        defaults::TIMEOUT_SECS as i64,
        ImageTransport::default(),
    );
    client.test_connection().await;
    client
}

async fn get_models_handler(body: Bytes) -> Json<ModelsResponse> {
    let request: GetModelsRequest = if body.is_empty() {
        GetModelsRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => return Json(ModelsResponse::failure(e.to_string())),
        }
    };
    let server_url = request
        .server_url
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| defaults::SERVER_URL.to_string());

    let client = probe(&server_url).await;
    if client.connected() {
        Json(ModelsResponse {
            models: client.available_models().to_vec(),
            success: true,
            ..ModelsResponse::default()
        })
    } else {
        Json(ModelsResponse::failure("Failed to connect to Ollama server"))
    }
}

fn bad_request(error: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ModelsResponse::failure(error))).into_response()
}

async fn get_models_by_name_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("application/json"))
        .unwrap_or(false);
    if !is_json {
        return bad_request("Content-Type must be application/json");
    }

    let data = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => return bad_request("Invalid JSON data"),
    };
    let server_name = data
        .get("server_name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if server_name.is_empty() {
        return bad_request("Server name is required");
    }

    let config = ServerConfig::load(&state.config_path);
    let server_url = config.resolve_url(&server_name);
    let client = probe(&server_url).await;

    let response = if client.connected() {
        let models = client.available_models().to_vec();
        ModelsResponse {
            model_count: Some(models.len()),
            models,
            success: true,
            server_name: Some(server_name),
            server_url: Some(server_url),
            error: None,
        }
    } else {
        ModelsResponse {
            error: Some(format!(
                "Failed to connect to server '{}' at {}",
                server_name, server_url
            )),
            server_name: Some(server_name),
            server_url: Some(server_url),
            ..ModelsResponse::default()
        }
    };
    (StatusCode::OK, Json(response)).into_response()
}

async fn node_definitions_handler(State(state): State<AppState>) -> Json<Vec<NodeDefinition>> {
    Json(
        state
            .registry
            .all_metadata()
            .into_iter()
            .map(NodeDefinition::from)
            .collect(),
    )
}

//! Client-wide constants
//!
//! Single source of truth for defaults and parameter limits.

/// Default values for client construction
pub mod defaults {
    /// Ollama's default listen address
    pub const SERVER_URL: &str = "http://127.0.0.1:11434";
    /// Display name of the built-in server entry
    pub const SERVER_NAME: &str = "Local Server";
    /// Model used when a connection payload names none
    pub const MODEL: &str = "llama2";
    /// Request timeout when none is configured
    pub const TIMEOUT_SECS: u64 = 30;
    /// System prompt for single-shot requests
    pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
    /// Token budget for single-shot requests
    pub const MAX_TOKENS: i64 = 500;
}

/// Parameter ranges enforced before every request
pub mod limits {
    pub const TEMPERATURE_MIN: f64 = 0.0;
    pub const TEMPERATURE_MAX: f64 = 2.0;
    /// Multi-image requests use a tighter ceiling
    pub const MULTI_IMAGE_TEMPERATURE_MAX: f64 = 1.0;
    pub const TOKENS_MIN: i64 = 1;
    pub const TOKENS_MAX: i64 = 8192;
    pub const TIMEOUT_MIN_SECS: i64 = 5;
    pub const TIMEOUT_MAX_SECS: i64 = 300;
    /// Maximum images in one multi-image request
    pub const MAX_IMAGES: usize = 10;
    /// Shortest string considered as inline base64 image data
    pub const BASE64_MIN_LEN: usize = 100;
}

/// Environment variables read by the workspace
pub mod env {
    /// Overrides the server list file location
    pub const CONFIG_PATH: &str = "OLLAMA_NODES_CONFIG";
}

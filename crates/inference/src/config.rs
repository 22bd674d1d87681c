//! Server list configuration
//!
//! The server list lives in a YAML file:
//!
//! ```yaml
//! ollama_servers:
//!   - name: Local Server
//!     url: http://127.0.0.1:11434
//! ```
//!
//! The file is read fresh on every call. A missing, empty or unparseable
//! file yields the built-in single-server default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{defaults, env};

/// A named Ollama server endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub name: String,
    pub url: String,
}

impl ServerDescriptor {
    /// The built-in local server entry
    pub fn builtin() -> Self {
        Self {
            name: defaults::SERVER_NAME.to_string(),
            url: defaults::SERVER_URL.to_string(),
        }
    }
}

/// On-disk shape; the key may be absent
#[derive(Debug, Default, Deserialize)]
struct RawServerConfig {
    #[serde(default)]
    ollama_servers: Option<Vec<ServerDescriptor>>,
}

/// Loaded server list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub ollama_servers: Vec<ServerDescriptor>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ollama_servers: vec![ServerDescriptor::builtin()],
        }
    }
}

impl ServerConfig {
    /// Load the server list, surfacing IO and parse failures
    ///
    /// An empty file, or one without a usable `ollama_servers` list, loads
    /// as the default.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let raw: Option<RawServerConfig> = serde_yaml::from_str(&contents)?;
        match raw.and_then(|raw| raw.ollama_servers) {
            Some(servers) if !servers.is_empty() => Ok(Self {
                ollama_servers: servers,
            }),
            _ => Ok(Self::default()),
        }
    }

    /// Load the server list, falling back to the default on any failure
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No server config at {:?}, using default", path);
                Self::default()
            }
            Err(e) => {
                log::warn!("Failed to load server config {:?}, using default: {}", path, e);
                Self::default()
            }
        }
    }

    /// Load from the resolved config path
    pub fn load_default() -> Self {
        Self::load(&config_path())
    }

    /// All configured servers
    pub fn servers(&self) -> &[ServerDescriptor] {
        &self.ollama_servers
    }

    /// Server names for dropdown display
    pub fn server_names(&self) -> Vec<String> {
        self.ollama_servers.iter().map(|s| s.name.clone()).collect()
    }

    /// URL of the first configured server
    pub fn default_server_url(&self) -> String {
        self.ollama_servers
            .first()
            .map(|s| s.url.clone())
            .unwrap_or_else(|| defaults::SERVER_URL.to_string())
    }

    /// Name of the first configured server
    pub fn default_server_name(&self) -> String {
        self.ollama_servers
            .first()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| defaults::SERVER_NAME.to_string())
    }

    /// Find a server by name
    pub fn find(&self, name: &str) -> Option<&ServerDescriptor> {
        self.ollama_servers.iter().find(|s| s.name == name)
    }

    /// URL for a server name, or the built-in URL if the name is unknown
    pub fn resolve_url(&self, name: &str) -> String {
        match self.find(name) {
            Some(server) if !server.url.is_empty() => server.url.clone(),
            _ => {
                log::warn!("Server '{}' not found, using default URL", name);
                defaults::SERVER_URL.to_string()
            }
        }
    }
}

/// File name of the server list
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the server list file path
///
/// `OLLAMA_NODES_CONFIG` wins; then `<config dir>/ollama-nodes/config.yaml`;
/// then `config.yaml` in the working directory.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(env::CONFIG_PATH) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("ollama-nodes").join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

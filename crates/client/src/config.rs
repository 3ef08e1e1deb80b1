//! Client configuration.
//!
//! Stored as TOML; every field is optional on disk and falls back to the
//! defaults below.
//!
//! ```toml
//! server = "127.0.0.1"
//! port = 1379
//! identifier = "2025123456"
//! connect_timeout_secs = 10
//! io_timeout_secs = 10
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use step_protocol::DEFAULT_PORT;
use step_transfer::HASH_BUFFER_SIZE;

/// Errors loading or saving a [`ClientConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host name or IP address.
    #[serde(default = "default_server")]
    pub server: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Identity used for automatic login after connecting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Per read/write timeout; 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub io_timeout_secs: u64,

    /// Read size used when hashing local files.
    #[serde(default = "default_hash_buffer_size")]
    pub hash_buffer_size: usize,
}

fn default_server() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_hash_buffer_size() -> usize {
    HASH_BUFFER_SIZE
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_port(),
            identifier: None,
            connect_timeout_secs: default_timeout_secs(),
            io_timeout_secs: default_timeout_secs(),
            hash_buffer_size: default_hash_buffer_size(),
        }
    }
}

impl ClientConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads configuration from `path`, or returns the defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// `host:port` string suitable for connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            io_timeout: match self.io_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            hash_buffer_size: self.hash_buffer_size,
        }
    }
}

/// Runtime settings of a single [`Session`](crate::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub connect_timeout: Duration,
    /// Limit on each request write and each response read.
    pub io_timeout: Option<Duration>,
    pub hash_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        ClientConfig::default().session_config()
    }
}

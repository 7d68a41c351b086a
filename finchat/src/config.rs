//! Configuration for finchat

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ChatError;

/// Default config file location
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("finchat")
        .join("config.toml")
}

/// Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the agent backend (single-shot calls and health probe)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Streaming endpoint. Derived from `api_base_url` when unset.
    #[serde(default)]
    pub ws_url: Option<String>,

    /// Use the persistent connection. When false every query is single-shot.
    #[serde(default = "default_true")]
    pub streaming: bool,

    /// How long a teardown waits for the close handshake
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,

    /// How long the terminal client waits for the connection to open
    /// before submitting its first query
    #[serde(default = "default_connect_wait_ms")]
    pub connect_wait_ms: u64,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_true() -> bool {
    true
}

fn default_close_grace_ms() -> u64 {
    500
}

fn default_connect_wait_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            ws_url: None,
            streaming: true,
            close_grace_ms: default_close_grace_ms(),
            connect_wait_ms: default_connect_wait_ms(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ChatError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load config from file, or defaults if the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ChatError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ChatError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ChatError::Config(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Single-shot chat endpoint
    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.base())
    }

    /// Backend health endpoint
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base())
    }

    /// Streaming endpoint: the explicit `ws_url`, or the base URL with its
    /// `http` scheme prefix swapped for `ws` plus `/ws/chat`.
    pub fn stream_url(&self) -> String {
        if let Some(url) = &self.ws_url {
            return url.clone();
        }
        let base = self.base();
        let ws_base = match base.strip_prefix("http") {
            Some(rest) => format!("ws{}", rest),
            None => base.to_string(),
        };
        format!("{}/ws/chat", ws_base)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    pub fn connect_wait(&self) -> Duration {
        Duration::from_millis(self.connect_wait_ms)
    }

    fn base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert!(config.streaming);
        assert_eq!(config.close_grace_ms, 500);
    }

    #[test]
    fn test_stream_url_derived_from_base() {
        let config = Config::default();
        assert_eq!(config.stream_url(), "ws://localhost:8000/ws/chat");

        let secure = Config {
            api_base_url: "https://agent.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(secure.stream_url(), "wss://agent.example.com/ws/chat");
        assert_eq!(secure.chat_url(), "https://agent.example.com/chat");
        assert_eq!(secure.health_url(), "https://agent.example.com/health");
    }

    #[test]
    fn test_explicit_ws_url_wins() {
        let config = Config {
            ws_url: Some("ws://127.0.0.1:3000/ws/chat".to_string()),
            ..Default::default()
        };
        assert_eq!(config.stream_url(), "ws://127.0.0.1:3000/ws/chat");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("streaming = false\n").unwrap();
        assert!(!config.streaming);
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.ws_url, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            api_base_url: "http://10.0.0.5:8000".to_string(),
            streaming: false,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }
}

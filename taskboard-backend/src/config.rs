/// Configuration for the taskboard backend.
/// Reads server.json from ~/.config/taskboard/server.json (or platform equivalent).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG: &str = "TASKBOARD_CONFIG";
pub const ENV_VAULT: &str = "TASKBOARD_VAULT";
pub const ENV_PORT: &str = "TASKBOARD_PORT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Directory that vault-relative paths resolve against.
    #[serde(default = "default_vault_root")]
    pub vault_root: String,
    /// Where settings, tag colours and lane orders are kept.
    #[serde(default)]
    pub data_file: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_vault_root() -> String {
    ".".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            vault_root: default_vault_root(),
            data_file: None,
        }
    }
}

impl ServerConfig {
    pub fn vault_path(&self) -> PathBuf {
        PathBuf::from(&self.vault_root)
    }

    pub fn data_path(&self) -> PathBuf {
        match &self.data_file {
            Some(file) => PathBuf::from(file),
            None => config_dir().join("data.json"),
        }
    }

    /// Apply `TASKBOARD_VAULT` / `TASKBOARD_PORT` style overrides.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(vault) = lookup(ENV_VAULT).filter(|v| !v.trim().is_empty()) {
            self.vault_root = vault;
        }
        if let Some(port) = lookup(ENV_PORT) {
            match port.trim().parse() {
                Ok(port) => self.port = port,
                Err(e) => log::warn!("[taskboard.config] Ignoring {}={:?}: {}", ENV_PORT, port, e),
            }
        }
        self
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
}

/// Default config path: ~/.config/taskboard/server.json, unless
/// `TASKBOARD_CONFIG` names another file.
pub fn default_config_path() -> PathBuf {
    match std::env::var(ENV_CONFIG) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => config_dir().join("server.json"),
    }
}

/// Load config from path. Returns default if file doesn't exist.
pub fn load_config(path: &Path) -> ServerConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("[taskboard.config] Failed to parse config {}: {}", path.display(), e);
            ServerConfig::default()
        }),
        Err(_) => {
            log::info!("[taskboard.config] No config at {}, using defaults", path.display());
            ServerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("nope.json"));
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_address, "127.0.0.1");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        fs::write(&path, r#"{"port": 9000, "vaultRoot": "/notes"}"#).unwrap();
        let config = load_config(&path);
        assert_eq!(config.port, 9000);
        assert_eq!(config.vault_root, "/notes");
        assert_eq!(config.bind_address, "127.0.0.1");
        assert!(config.data_file.is_none());
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config(&path), ServerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::default().with_overrides(|key| match key {
            ENV_VAULT => Some("/vault".to_string()),
            ENV_PORT => Some("abc".to_string()),
            _ => None,
        });
        assert_eq!(config.vault_root, "/vault");
        assert_eq!(config.port, 8080);

        let config = ServerConfig::default().with_overrides(|key| (key == ENV_PORT).then(|| "9123".to_string()));
        assert_eq!(config.port, 9123);
    }

    #[test]
    fn test_data_path() {
        let config = ServerConfig {
            data_file: Some("/tmp/board-data.json".into()),
            ..Default::default()
        };
        assert_eq!(config.data_path(), PathBuf::from("/tmp/board-data.json"));
        assert!(ServerConfig::default().data_path().ends_with("taskboard/data.json"));
    }
}

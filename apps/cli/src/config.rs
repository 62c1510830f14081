//! Client configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/hashdrop/client.toml`
//! - Windows: `%APPDATA%/hashdrop/client.toml`

use std::path::{Path, PathBuf};

use hashdrop_upload::EngineConfig;
use serde::{Deserialize, Serialize};

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bearer token for the backend. Cleared when the backend rejects it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Folder new uploads land in (0 = root).
    #[serde(default)]
    pub folder_id: i64,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_api_base() -> String {
    "http://localhost:8080/api".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            access_token: None,
            folder_id: 0,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Saves the current configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file holds a credential.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Renders the configuration with the token masked.
    pub fn redacted(&self) -> anyhow::Result<String> {
        let mut shown = self.clone();
        if shown.access_token.is_some() {
            shown.access_token = Some("********".into());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")?;
        Ok(PathBuf::from(appdata).join("hashdrop").join("client.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("hashdrop")
            .join("client.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.api_base, "http://localhost:8080/api");
        assert!(config.access_token.is_none());
        assert_eq!(config.folder_id, 0);
        assert_eq!(config.engine.max_concurrent_files, 3);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let toml_str = r#"
            access_token = "abc"

            [engine]
            max_concurrent_files = 1

            [engine.chunk_retry]
            base_delay_ms = 250
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.access_token.as_deref(), Some("abc"));
        assert_eq!(config.api_base, "http://localhost:8080/api");
        assert_eq!(config.engine.max_concurrent_files, 1);
        assert_eq!(config.engine.chunk_retry.base_delay_ms, 250);
        assert_eq!(config.engine.chunk_retry.max_attempts, 4);
        assert_eq!(config.engine.request_retry.max_attempts, 2);
    }

    #[test]
    fn missing_file_writes_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("client.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.api_base, default_api_base());
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("client.toml");

        let config = Config {
            api_base: "https://files.example.com/api".into(),
            access_token: Some("secret".into()),
            folder_id: 12,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base, "https://files.example.com/api");
        assert_eq!(loaded.access_token.as_deref(), Some("secret"));
        assert_eq!(loaded.folder_id, 12);
        assert_eq!(loaded.engine, config.engine);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn cleared_token_is_omitted() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("client.toml");

        let mut config = Config {
            access_token: Some("stale".into()),
            ..Config::default()
        };
        config.access_token = None;
        config.save_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("access_token"));
    }

    #[test]
    fn redacted_masks_token() {
        let config = Config {
            access_token: Some("secret".into()),
            ..Config::default()
        };
        let shown = config.redacted().unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains("********"));
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("hashdrop"));
    }
}

use abkit_editor::EngineConfig;
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "abkit.config.json";

/// abkit configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Marker prefix and history depth
    #[serde(flatten)]
    pub engine: EngineConfig,

    /// URL given to pages loaded from disk when `--url` is not passed
    #[serde(default = "default_url")]
    pub default_url: String,
}

fn default_url() -> String {
    "https://localhost/".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let config_path = dir.join(DEFAULT_CONFIG_NAME);

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Cannot read {}", config_path.display()))?;
            serde_json::from_str::<Config>(&content)
                .with_context(|| format!("Invalid config file {}", config_path.display()))?
        } else {
            // Return default config if none exists
            Config::default()
        };

        config
            .engine
            .validate()
            .map_err(|e| anyhow!("{}: {}", config_path.display(), e))?;
        Ok(config)
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(DEFAULT_CONFIG_NAME)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            default_url: default_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "markerPrefix": "data-exp",
            "maxHistory": 20,
            "defaultUrl": "https://shop.test/"
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.engine.marker_prefix, "data-exp");
        assert_eq!(config.engine.max_history, 20);
        assert_eq!(config.default_url, "https://shop.test/");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{ "maxHistory": 5 }"#).unwrap();
        assert_eq!(config.engine.marker_prefix, "data-abkit");
        assert_eq!(config.engine.max_history, 5);
        assert_eq!(config.default_url, "https://localhost/");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine, EngineConfig::default());
        assert!(config.engine.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("abkit-config-test-missing");
        let config = Config::load(&dir).unwrap();
        assert_eq!(config, Config::default());
    }
}

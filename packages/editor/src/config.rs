use crate::errors::{EditorError, EditorResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MARKER_PREFIX: &str = "data-abkit";
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Engine settings shared by the applier, history and preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Prefix of every marker attribute (`{prefix}-change`, `{prefix}-key`,
    /// `{prefix}-created`)
    #[serde(default = "default_marker_prefix")]
    pub marker_prefix: String,

    /// Undo levels kept per edit session (0 = unlimited)
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_marker_prefix() -> String {
    DEFAULT_MARKER_PREFIX.to_string()
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            marker_prefix: default_marker_prefix(),
            max_history: default_max_history(),
        }
    }
}

impl EngineConfig {
    pub fn with_marker_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.marker_prefix = prefix.into();
        self
    }

    pub fn with_max_history(mut self, levels: usize) -> Self {
        self.max_history = levels;
        self
    }

    pub fn validate(&self) -> EditorResult<()> {
        let prefix = &self.marker_prefix;
        let rest = prefix.strip_prefix("data-").unwrap_or_default();
        let valid = !rest.is_empty()
            && !rest.starts_with('-')
            && rest
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

        if !valid {
            return Err(EditorError::Config(format!(
                "marker prefix '{}' must be 'data-' followed by lowercase letters, digits or '-'",
                prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{ "markerPrefix": "data-exp", "maxHistory": 20 }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.marker_prefix, "data-exp");
        assert_eq!(config.max_history, 20);
    }

    #[test]
    fn test_default_config() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prefix_rules() {
        for bad in ["abkit", "data-", "data-ABkit", "data-a b", "data--x"] {
            let config = EngineConfig::default().with_marker_prefix(bad);
            assert!(config.validate().is_err(), "{} should be rejected", bad);
        }
        let ok = EngineConfig::default().with_marker_prefix("data-ab-2");
        assert!(ok.validate().is_ok());
    }
}

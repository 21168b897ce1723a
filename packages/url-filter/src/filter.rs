use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How patterns are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Globs: `*` any run of characters, `?` one character
    #[default]
    Simple,
    /// Regular expressions used verbatim
    Regex,
}

/// Which part of the URL patterns are compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    FullUrl,
    /// Pathname plus hash
    #[default]
    Path,
    Domain,
    Query,
    Hash,
}

/// Per-variant URL filter, part of the stored experiment configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlFilter {
    #[serde(default)]
    pub mode: FilterMode,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub match_type: MatchType,

    /// Keys this version does not know about, kept so storage round-trips
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UrlFilter {
    /// Simple-mode filter on the path with the given include patterns
    pub fn include<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: patterns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mode(mut self, mode: FilterMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = match_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let filter: UrlFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(filter.mode, FilterMode::Simple);
        assert_eq!(filter.match_type, MatchType::Path);
        assert!(filter.include.is_empty());
        assert!(filter.exclude.is_empty());
    }

    #[test]
    fn test_wire_names() {
        let json = r#"{"mode":"regex","include":["^/a"],"exclude":[],"matchType":"full-url"}"#;
        let filter: UrlFilter = serde_json::from_str(json).unwrap();
        assert_eq!(filter.mode, FilterMode::Regex);
        assert_eq!(filter.match_type, MatchType::FullUrl);
        assert_eq!(serde_json::to_string(&filter).unwrap(), json);
    }

    #[test]
    fn test_unknown_keys_round_trip() {
        let json = r#"{"mode":"simple","include":["/a"],"exclude":[],"matchType":"path","note":"keep me"}"#;
        let filter: UrlFilter = serde_json::from_str(json).unwrap();
        assert_eq!(filter.extra.get("note").and_then(Value::as_str), Some("keep me"));

        let back: Value = serde_json::from_str(&serde_json::to_string(&filter).unwrap()).unwrap();
        let original: Value = serde_json::from_str(json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_unknown_match_type_rejected() {
        let json = r#"{"matchType":"port"}"#;
        assert!(serde_json::from_str::<UrlFilter>(json).is_err());
    }
}

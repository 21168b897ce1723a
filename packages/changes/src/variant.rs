use crate::errors::{ValidationError, ValidationResult};
use crate::raw::RawChange;
use crate::record::ChangeRecord;
use abkit_url_filter::UrlFilter;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ids become parts of marker tokens (`experiment/variant/record`), so the
/// separator and whitespace are not allowed.
pub fn validate_owner_id(kind: &'static str, id: &str) -> ValidationResult<()> {
    if id.is_empty() || id.contains('/') || id.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidId {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// The ordered changes of one variant of one experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantChangeSet {
    pub experiment_id: String,
    pub variant_id: String,
    #[serde(default)]
    pub changes: Vec<ChangeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<UrlFilter>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVariant {
    experiment_id: String,
    variant_id: String,
    #[serde(default)]
    changes: Vec<Value>,
    #[serde(default)]
    url_filter: Option<UrlFilter>,
}

impl VariantChangeSet {
    pub fn new(
        experiment_id: impl Into<String>,
        variant_id: impl Into<String>,
    ) -> ValidationResult<Self> {
        let experiment_id = experiment_id.into();
        let variant_id = variant_id.into();
        validate_owner_id("experiment", &experiment_id)?;
        validate_owner_id("variant", &variant_id)?;

        Ok(Self {
            experiment_id,
            variant_id,
            changes: Vec::new(),
            url_filter: None,
        })
    }

    pub fn with_change(mut self, change: ChangeRecord) -> Self {
        self.changes.push(change);
        self
    }

    pub fn with_changes(mut self, changes: impl IntoIterator<Item = ChangeRecord>) -> Self {
        self.changes.extend(changes);
        self
    }

    pub fn with_url_filter(mut self, filter: UrlFilter) -> Self {
        self.url_filter = Some(filter);
        self
    }

    /// Enabled changes in list order
    pub fn enabled_changes(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.changes.iter().filter(|c| c.is_enabled())
    }

    /// Parse a variant payload, failing on the first invalid change
    pub fn from_json(json: &str) -> ValidationResult<Self> {
        let raw: RawVariant = serde_json::from_str(json)?;
        let mut set = Self::new(raw.experiment_id, raw.variant_id)?;
        set.url_filter = raw.url_filter;

        for (index, value) in raw.changes.into_iter().enumerate() {
            let record = parse_change(value).map_err(|e| ValidationError::InChange {
                index,
                source: Box::new(e),
            })?;
            set.changes.push(record);
        }
        Ok(set)
    }

    /// Check a payload and report every problem instead of the first
    pub fn validate_json(json: &str) -> Vec<ValidationError> {
        let raw: RawVariant = match serde_json::from_str(json) {
            Ok(raw) => raw,
            Err(e) => return vec![e.into()],
        };

        let mut errors = Vec::new();
        if let Err(e) = validate_owner_id("experiment", &raw.experiment_id) {
            errors.push(e);
        }
        if let Err(e) = validate_owner_id("variant", &raw.variant_id) {
            errors.push(e);
        }
        for (index, value) in raw.changes.into_iter().enumerate() {
            if let Err(e) = parse_change(value) {
                errors.push(ValidationError::InChange {
                    index,
                    source: Box::new(e),
                });
            }
        }
        errors
    }

    pub fn to_json_pretty(&self) -> ValidationResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn parse_change(value: Value) -> ValidationResult<ChangeRecord> {
    let raw: RawChange = serde_json::from_value(value)?;
    ChangeRecord::try_from(raw)
}

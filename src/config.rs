//! Tagging Configuration
//!
//! Immutable settings injected into the repositories at construction.
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | TAGS_IS_TRANSLATABLE | false | Resolve tag names through translations |
//! | APP_LOCALE | en | Default application locale |
//! | TAGS_TAGGABLE_TABLE | taggables | Link table name |
//! | TAGS_TAGGABLE_MORPH | taggable | Prefix of the `<morph>_type` / `<morph>_id` columns |

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{DomainError, DomainResult};

/// Settings for the link table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggableConfig {
    pub table_name: String,
    pub morph_name: String,
}

impl Default for TaggableConfig {
    fn default() -> Self {
        Self {
            table_name: "taggables".to_string(),
            morph_name: "taggable".to_string(),
        }
    }
}

impl TaggableConfig {
    pub fn type_column(&self) -> String {
        format!("{}_type", self.morph_name)
    }

    pub fn id_column(&self) -> String {
        format!("{}_id", self.morph_name)
    }
}

/// Top-level tagging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagsConfig {
    /// Toggle if tag names are translatable
    pub is_translatable: bool,
    /// Locale whose values live in the base `name` / `slug` columns
    pub default_locale: String,
    pub taggable: TaggableConfig,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            is_translatable: false,
            default_locale: "en".to_string(),
            taggable: TaggableConfig::default(),
        }
    }
}

impl TagsConfig {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables keep their default value.
    pub fn from_env() -> DomainResult<Self> {
        let defaults = Self::default();
        let config = Self {
            is_translatable: std::env::var("TAGS_IS_TRANSLATABLE")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.is_translatable),
            default_locale: std::env::var("APP_LOCALE").unwrap_or(defaults.default_locale),
            taggable: TaggableConfig {
                table_name: std::env::var("TAGS_TAGGABLE_TABLE")
                    .unwrap_or(defaults.taggable.table_name),
                morph_name: std::env::var("TAGS_TAGGABLE_MORPH")
                    .unwrap_or(defaults.taggable.morph_name),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON document; missing keys take defaults
    pub fn from_json_str(json: &str) -> DomainResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DomainError::InvalidInput(format!("Invalid tags config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn load(path: &Path) -> DomainResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            DomainError::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn with_translations(mut self, enabled: bool) -> Self {
        self.is_translatable = enabled;
        self
    }

    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    /// Table and morph names are spliced into SQL, so they must be plain identifiers.
    pub fn validate(&self) -> DomainResult<()> {
        check_identifier("taggable.table_name", &self.taggable.table_name)?;
        check_identifier("taggable.morph_name", &self.taggable.morph_name)?;
        if self.default_locale.trim().is_empty() {
            return Err(DomainError::InvalidInput("default_locale must not be empty".into()));
        }
        Ok(())
    }

    pub fn is_default_locale(&self, locale: &str) -> bool {
        self.default_locale == locale
    }
}

pub(crate) fn check_identifier(label: &str, value: &str) -> DomainResult<()> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DomainError::InvalidInput(format!(
            "{} must be a plain SQL identifier, got '{}'",
            label, value
        )))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

//! Tag Entity
//!
//! Tags are named, optionally typed and translated labels attached to owners.

use serde::{Deserialize, Serialize};
use super::entity::Entity;
use crate::config::TagsConfig;

/// Fields that may carry per-locale values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatableField {
    Name,
    Slug,
}

impl TranslatableField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslatableField::Name => "name",
            TranslatableField::Slug => "slug",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(TranslatableField::Name),
            "slug" => Some(TranslatableField::Slug),
            _ => None,
        }
    }
}

/// One translated value of a tag field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagTranslation {
    pub field: TranslatableField,
    pub locale: String,
    pub value: String,
}

/// A tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Display name in the default locale
    pub name: String,
    /// Url-safe identifier
    pub slug: String,
    /// Namespace, `None` for untyped tags
    #[serde(rename = "type")]
    pub tag_type: Option<String>,
    /// Position within the tag's type
    pub order_column: i64,
    /// Loaded only when translation support is enabled
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<TagTranslation>,
}

impl Tag {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            slug: name.clone(),
            name,
            tag_type: None,
            order_column: 0,
            translations: Vec::new(),
        }
    }

    pub fn with_type(mut self, tag_type: impl Into<String>) -> Self {
        self.tag_type = Some(tag_type.into());
        self
    }

    pub fn translation(&self, field: TranslatableField, locale: &str) -> Option<&str> {
        self.translations
            .iter()
            .find(|t| t.field == field && t.locale == locale)
            .map(|t| t.value.as_str())
    }

    /// Name as seen from `locale`.
    ///
    /// Falls back to the base column when translations are disabled, when `locale` is
    /// the default locale, or when no translation exists for it.
    pub fn resolved_name<'a>(&'a self, locale: &str, config: &TagsConfig) -> &'a str {
        self.resolved(TranslatableField::Name, locale, config)
    }

    pub fn resolved_slug<'a>(&'a self, locale: &str, config: &TagsConfig) -> &'a str {
        self.resolved(TranslatableField::Slug, locale, config)
    }

    fn resolved<'a>(
        &'a self,
        field: TranslatableField,
        locale: &str,
        config: &TagsConfig,
    ) -> &'a str {
        let base = match field {
            TranslatableField::Name => self.name.as_str(),
            TranslatableField::Slug => self.slug.as_str(),
        };
        if !config.is_translatable || config.is_default_locale(locale) {
            return base;
        }
        self.translation(field, locale).unwrap_or(base)
    }
}

impl Entity for Tag {
    type Id = i64;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Sort order for `order_column` listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

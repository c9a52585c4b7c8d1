//! Translation records and the typed request shapes that create or change them.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationErrors;
use crate::tags::{parse_tag_set, TagSet, TagUpdate};

pub type TranslationId = i64;

/// Longest translation key accepted, in characters
pub const MAX_KEY_LEN: usize = 255;

/// Longest locale code accepted, in characters
pub const MAX_LOCALE_LEN: usize = 16;

static LOCALE_REGEX: OnceLock<Regex> = OnceLock::new();

fn locale_regex() -> &'static Regex {
    LOCALE_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z]{2,3}(?:[-_][A-Za-z0-9]{2,8})*$").expect("locale regex is valid")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Opaque translation payload.
///
/// Either a plain string or a JSON object/array (commonly a map from locale
/// variant to text). The service never interprets it beyond extracting the
/// text that search runs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Content(Value);

impl Content {
    /// Accept a request value, rejecting empty or non-textual payloads.
    pub fn parse(value: Value) -> Result<Self, &'static str> {
        match &value {
            Value::String(s) if s.trim().is_empty() => Err("The content field is required."),
            Value::String(_) => Ok(Self(value)),
            Value::Object(map) if map.is_empty() => Err("The content field is required."),
            Value::Array(items) if items.is_empty() => Err("The content field is required."),
            Value::Object(_) | Value::Array(_) => Ok(Self(value)),
            Value::Null => Err("The content field is required."),
            Value::Bool(_) | Value::Number(_) => {
                Err("The content must be a string or an object.")
            }
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Text that free-text search matches against: every string leaf,
    /// newline separated. Object keys are not included.
    pub fn search_text(&self) -> String {
        let mut parts = Vec::new();
        collect_strings(&self.0, &mut parts);
        parts.join("\n")
    }

    /// Compact JSON text as persisted by SQL stores
    pub fn to_storage(&self) -> String {
        self.0.to_string()
    }

    pub fn from_storage(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw).map(Self)
    }
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self(Value::String(text.to_string()))
    }
}

/// A stored translation together with its tags (sorted by name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub id: TranslationId,
    pub locale: String,
    pub key: String,
    pub content: Content,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Translation {
    pub fn tag_names(&self) -> BTreeSet<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }
}

/// Validated input for a new translation
#[derive(Debug, Clone, PartialEq)]
pub struct NewTranslation {
    pub locale: String,
    pub key: String,
    pub content: Content,
    pub tags: TagSet,
}

/// Validated change set applied to an existing translation in one write
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslationChanges {
    pub content: Option<Content>,
    pub tags: TagUpdate,
}

impl TranslationChanges {
    pub fn tags(tags: TagUpdate) -> Self {
        Self {
            content: None,
            tags,
        }
    }
}

/// Create request body: `{locale, key, content, tags}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTranslation {
    pub locale: Option<String>,
    pub key: Option<String>,
    pub content: Option<Value>,
    pub tags: Option<Vec<String>>,
}

impl CreateTranslation {
    pub fn new(locale: &str, key: &str, content: impl Into<Value>, tags: &[&str]) -> Self {
        Self {
            locale: Some(locale.to_string()),
            key: Some(key.to_string()),
            content: Some(content.into()),
            tags: Some(tags.iter().map(|t| t.to_string()).collect()),
        }
    }

    pub fn validate(&self) -> Result<NewTranslation, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let locale = validate_locale(self.locale.as_deref(), &mut errors);
        let key = validate_key(self.key.as_deref(), &mut errors);
        let content = match self.content.clone().map(Content::parse) {
            Some(Ok(content)) => Some(content),
            Some(Err(message)) => {
                errors.add("content", message);
                None
            }
            None => {
                errors.add("content", "The content field is required.");
                None
            }
        };
        let tags = validate_tags(self.tags.as_deref().unwrap_or_default(), &mut errors);

        match (locale, key, content, tags) {
            (Some(locale), Some(key), Some(content), Some(tags)) if errors.is_empty() => {
                Ok(NewTranslation {
                    locale,
                    key,
                    content,
                    tags,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Update request body. `locale` and `key` may be echoed back but never changed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTranslation {
    pub locale: Option<String>,
    pub key: Option<String>,
    pub content: Option<Value>,
    pub tags: Option<Vec<String>>,
}

impl UpdateTranslation {
    /// Validate against the stored row. Present tags replace the current set.
    pub fn validate(&self, current: &Translation) -> Result<TranslationChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(locale) = &self.locale {
            if locale.trim() != current.locale {
                errors.add("locale", "The locale of an existing translation cannot be changed.");
            }
        }
        if let Some(key) = &self.key {
            if key.trim() != current.key {
                errors.add("key", "The key of an existing translation cannot be changed.");
            }
        }

        let content = match self.content.clone().map(Content::parse) {
            Some(Ok(content)) => Some(content),
            Some(Err(message)) => {
                errors.add("content", message);
                None
            }
            None => None,
        };

        let tags = match self.tags.as_deref() {
            Some(raw) => validate_tags(raw, &mut errors).map(TagUpdate::Replace),
            None => Some(TagUpdate::Keep),
        };

        match tags {
            Some(tags) if errors.is_empty() => Ok(TranslationChanges { content, tags }),
            _ => Err(errors),
        }
    }
}

/// Assign-tags request body: `{tags}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignTags {
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AssignTags {
    pub fn validate(&self) -> Result<TagSet, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match validate_tags(&self.tags, &mut errors) {
            Some(tags) => errors.into_result(tags),
            None => Err(errors),
        }
    }
}

fn validate_locale(raw: Option<&str>, errors: &mut ValidationErrors) -> Option<String> {
    let locale = raw.map(str::trim).unwrap_or_default();
    if locale.is_empty() {
        errors.add("locale", "The locale field is required.");
        return None;
    }
    if locale.chars().count() > MAX_LOCALE_LEN {
        errors.add(
            "locale",
            format!("The locale may not be greater than {} characters.", MAX_LOCALE_LEN),
        );
        return None;
    }
    if !locale_regex().is_match(locale) {
        errors.add("locale", "The locale format is invalid.");
        return None;
    }
    Some(locale.to_string())
}

fn validate_key(raw: Option<&str>, errors: &mut ValidationErrors) -> Option<String> {
    let key = raw.map(str::trim).unwrap_or_default();
    if key.is_empty() {
        errors.add("key", "The key field is required.");
        return None;
    }
    if key.chars().count() > MAX_KEY_LEN {
        errors.add(
            "key",
            format!("The key may not be greater than {} characters.", MAX_KEY_LEN),
        );
        return None;
    }
    Some(key.to_string())
}

fn validate_tags(raw: &[String], errors: &mut ValidationErrors) -> Option<TagSet> {
    match parse_tag_set(raw) {
        Ok(tags) => Some(tags),
        Err(messages) => {
            for message in messages {
                errors.add("tags", message);
            }
            None
        }
    }
}

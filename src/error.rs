use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::model::TranslationId;
use crate::store::StoreError;

/// Field-level validation failures collected before the store is touched.
///
/// Messages are grouped by the request field they refer to, so the HTTP layer
/// can return them as `{"errors": {"locale": ["..."]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Messages recorded for a single field (empty if the field is valid)
    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Return `value` if nothing was recorded, otherwise the collected errors
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut messages = self.fields.values().flatten();
        match messages.next() {
            Some(first) => {
                let remaining = messages.count();
                if remaining == 0 {
                    write!(f, "{}", first)
                } else {
                    write!(f, "{} (and {} more errors)", first, remaining)
                }
            }
            None => write!(f, "The given data was invalid."),
        }
    }
}

/// Everything a translation service operation can fail with.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request shape is wrong; detected before any store access
    #[error("{0}")]
    Validation(ValidationErrors),

    /// A translation with this locale and key already exists
    #[error("Translation '{key}' already exists for locale '{locale}'")]
    Conflict { locale: String, key: String },

    #[error("Translation not found")]
    NotFound(TranslationId),

    /// The persistence layer failed in a way callers cannot fix
    #[error("Storage failure: {0}")]
    Store(StoreError),
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict { locale, key } => Self::Conflict { locale, key },
            other => Self::Store(other),
        }
    }
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

//! Persistence boundary for translations, tags and the relation between them.
//!
//! Every mutating method is atomic: the translation row and all of its tag
//! links are written together or not at all. Writes to the same translation
//! are serialized by the engine.

mod memory;
mod postgres;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::model::{NewTranslation, Tag, Translation, TranslationChanges, TranslationId};
use crate::search::SearchQuery;
use crate::tags::TagName;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// `DATABASE_URL` prefix selecting the in-process engine
pub const MEMORY_URL_PREFIX: &str = "memory://";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Translation {0} not found")]
    NotFound(TranslationId),
    #[error("Translation '{key}' already exists for locale '{locale}'")]
    Conflict { locale: String, key: String },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait TranslationStore: Send + Sync {
    /// All translations ordered by id
    async fn list_translations(&self) -> Result<Vec<Translation>, StoreError>;

    async fn get_translation(&self, id: TranslationId) -> Result<Option<Translation>, StoreError>;

    /// Insert a translation and link its tags, creating missing tag rows.
    /// Fails with `Conflict` when (locale, key) is taken.
    async fn insert_translation(&self, new: &NewTranslation) -> Result<Translation, StoreError>;

    /// Apply content and tag-link changes under the row's lock.
    /// Fails with `NotFound` when the row is gone at write time.
    async fn update_translation(
        &self,
        id: TranslationId,
        changes: &TranslationChanges,
    ) -> Result<Translation, StoreError>;

    /// Remove a translation and its links; tags themselves survive.
    async fn delete_translation(&self, id: TranslationId) -> Result<(), StoreError>;

    /// Atomic create-or-fetch keyed on the unique tag name
    async fn resolve_or_create_tag(&self, name: &TagName) -> Result<Tag, StoreError>;

    async fn find_tag(&self, name: &TagName) -> Result<Option<Tag>, StoreError>;

    /// Case-insensitive substring match over locale, key and content text
    async fn search_translations(&self, query: &SearchQuery) -> Result<Vec<Translation>, StoreError>;

    async fn translations_by_tag(&self, name: &TagName) -> Result<Vec<Translation>, StoreError>;

    /// Every translation read from one consistent point in time
    async fn snapshot(&self) -> Result<Vec<Translation>, StoreError>;
}

/// Open the store selected by `DATABASE_URL`.
pub async fn connect(config: &Config) -> Result<Arc<dyn TranslationStore>> {
    if config.database_url.starts_with(MEMORY_URL_PREFIX) {
        info!("Using in-memory store; data will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store =
        PostgresStore::connect(&config.database_url, config.database_max_connections).await?;
    Ok(Arc::new(store))
}

//! Translation management operations.
//!
//! Each method is one independent unit of work: input is validated first,
//! then a single store call (one transaction) performs the change. Errors are
//! surfaced as-is; nothing is retried here.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Result, ServiceError};
use crate::model::{
    AssignTags, CreateTranslation, Translation, TranslationChanges, TranslationId,
    UpdateTranslation,
};
use crate::search::SearchIndex;
use crate::store::TranslationStore;
use crate::tags::{TagRegistry, TagUpdate};

/// Message returned by a successful delete
pub const DELETED_MESSAGE: &str = "Translation deleted successfully";

#[derive(Clone)]
pub struct TranslationService {
    store: Arc<dyn TranslationStore>,
    tags: TagRegistry,
    search: SearchIndex,
}

impl TranslationService {
    pub fn new(store: Arc<dyn TranslationStore>) -> Self {
        Self {
            tags: TagRegistry::new(Arc::clone(&store)),
            search: SearchIndex::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub async fn get_all_translations(&self) -> Result<Vec<Translation>> {
        Ok(self.store.list_translations().await?)
    }

    /// Create a translation and link its tags, creating unknown tags on the way.
    pub async fn create_translation(&self, input: CreateTranslation) -> Result<Translation> {
        let new = input.validate()?;
        let translation = self.store.insert_translation(&new).await?;

        info!(
            "Created translation {} ({}/{}) with {} tags",
            translation.id,
            translation.locale,
            translation.key,
            translation.tags.len()
        );
        Ok(translation)
    }

    pub async fn get_translation_by_id(&self, id: TranslationId) -> Result<Translation> {
        self.store
            .get_translation(id)
            .await?
            .ok_or(ServiceError::NotFound(id))
    }

    /// Change content and/or replace the tag set.
    ///
    /// `locale` and `key` are the translation's identity and cannot change;
    /// a request carrying different values fails validation.
    pub async fn update_translation(
        &self,
        id: TranslationId,
        input: UpdateTranslation,
    ) -> Result<Translation> {
        let current = self.get_translation_by_id(id).await?;
        let changes = input.validate(&current)?;

        // A concurrent delete between the lookup and this write surfaces as NotFound
        let translation = match changes {
            TranslationChanges {
                content: None,
                tags: TagUpdate::Replace(names),
            } => self.tags.link_replacing(id, names).await?,
            changes => self.store.update_translation(id, &changes).await?,
        };

        info!("Updated translation {}", id);
        Ok(translation)
    }

    pub async fn delete_translation(&self, id: TranslationId) -> Result<&'static str> {
        self.store.delete_translation(id).await?;
        info!("Deleted translation {}", id);
        Ok(DELETED_MESSAGE)
    }

    /// Blank queries return nothing
    pub async fn search_translations(&self, query: Option<&str>) -> Result<Vec<Translation>> {
        let results = self.search.free_text(query).await?;
        debug!("Search {:?} matched {} translations", query, results.len());
        Ok(results)
    }

    /// Unknown tags yield an empty list
    pub async fn get_translations_by_tag(&self, tag_name: &str) -> Result<Vec<Translation>> {
        Ok(self.search.by_tag(tag_name).await?)
    }

    /// Add tags to the current set; existing links are kept.
    pub async fn assign_tags_to_translation(
        &self,
        id: TranslationId,
        input: AssignTags,
    ) -> Result<Translation> {
        let names = input.validate()?;
        let translation = self.tags.link_additive(id, names).await?;

        info!(
            "Assigned tags to translation {}; now has {} tags",
            id,
            translation.tags.len()
        );
        Ok(translation)
    }

    /// Every translation with its tags, read from one consistent snapshot
    pub async fn export_translations(&self) -> Result<Vec<Translation>> {
        let translations = self.store.snapshot().await?;
        info!("Exported {} translations", translations.len());
        Ok(translations)
    }
}

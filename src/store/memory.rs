use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{StoreError, TranslationStore};
use crate::model::{Content, NewTranslation, Tag, Translation, TranslationChanges, TranslationId};
use crate::search::SearchQuery;
use crate::tags::{TagName, TagUpdate};

#[derive(Debug, Clone)]
struct TranslationRow {
    id: TranslationId,
    locale: String,
    key: String,
    content: Content,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    last_translation_id: TranslationId,
    last_tag_id: i64,
    translations: BTreeMap<TranslationId, TranslationRow>,
    /// (locale, key) -> id
    identities: HashMap<(String, String), TranslationId>,
    tags: BTreeMap<i64, Tag>,
    tag_ids: HashMap<String, i64>,
    /// (translation id, tag id)
    links: BTreeSet<(TranslationId, i64)>,
}

impl State {
    fn resolve_tag(&mut self, name: &TagName) -> Tag {
        if let Some(id) = self.tag_ids.get(name.as_str()) {
            if let Some(tag) = self.tags.get(id) {
                return tag.clone();
            }
        }
        self.last_tag_id += 1;
        let tag = Tag {
            id: self.last_tag_id,
            name: name.as_str().to_string(),
        };
        self.tag_ids.insert(tag.name.clone(), tag.id);
        self.tags.insert(tag.id, tag.clone());
        tag
    }

    fn linked_tag_ids(&self, id: TranslationId) -> Vec<i64> {
        self.links
            .range((id, i64::MIN)..=(id, i64::MAX))
            .map(|(_, tag_id)| *tag_id)
            .collect()
    }

    #[cfg(test)]
    fn linked_names(&self, id: TranslationId) -> crate::tags::TagSet {
        self.linked_tag_ids(id)
            .into_iter()
            .filter_map(|tag_id| self.tags.get(&tag_id))
            .filter_map(|tag| TagName::parse(&tag.name).ok())
            .collect()
    }

    fn load(&self, row: &TranslationRow) -> Translation {
        let mut tags: Vec<Tag> = self
            .linked_tag_ids(row.id)
            .into_iter()
            .filter_map(|tag_id| self.tags.get(&tag_id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        Translation {
            id: row.id,
            locale: row.locale.clone(),
            key: row.key.clone(),
            content: row.content.clone(),
            tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn load_all<'a, I>(&self, rows: I) -> Vec<Translation>
    where
        I: IntoIterator<Item = &'a TranslationRow>,
    {
        rows.into_iter().map(|row| self.load(row)).collect()
    }
}

/// In-process engine.
///
/// A single `RwLock` guards every table, so each write is atomic and a read
/// always observes one consistent state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tag rows, including orphans
    pub async fn tag_count(&self) -> usize {
        self.state.read().await.tags.len()
    }

    pub async fn link_count(&self) -> usize {
        self.state.read().await.links.len()
    }

    /// Current tag names of a translation, normalized
    #[cfg(test)]
    async fn tag_names_of(&self, id: TranslationId) -> crate::tags::TagSet {
        self.state.read().await.linked_names(id)
    }
}

#[async_trait]
impl TranslationStore for MemoryStore {
    async fn list_translations(&self) -> Result<Vec<Translation>, StoreError> {
        let state = self.state.read().await;
        Ok(state.load_all(state.translations.values()))
    }

    async fn get_translation(&self, id: TranslationId) -> Result<Option<Translation>, StoreError> {
        let state = self.state.read().await;
        Ok(state.translations.get(&id).map(|row| state.load(row)))
    }

    async fn insert_translation(&self, new: &NewTranslation) -> Result<Translation, StoreError> {
        let mut state = self.state.write().await;

        let identity = (new.locale.clone(), new.key.clone());
        if state.identities.contains_key(&identity) {
            return Err(StoreError::Conflict {
                locale: new.locale.clone(),
                key: new.key.clone(),
            });
        }

        state.last_translation_id += 1;
        let now = Utc::now();
        let row = TranslationRow {
            id: state.last_translation_id,
            locale: new.locale.clone(),
            key: new.key.clone(),
            content: new.content.clone(),
            created_at: now,
            updated_at: now,
        };

        for name in &new.tags {
            let tag = state.resolve_tag(name);
            state.links.insert((row.id, tag.id));
        }
        state.identities.insert(identity, row.id);
        state.translations.insert(row.id, row.clone());

        Ok(state.load(&row))
    }

    async fn update_translation(
        &self,
        id: TranslationId,
        changes: &TranslationChanges,
    ) -> Result<Translation, StoreError> {
        let mut state = self.state.write().await;
        if !state.translations.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }

        if let Some(names) = changes.tags.names() {
            let resolved: Vec<Tag> = names.iter().map(|name| state.resolve_tag(name)).collect();
            if matches!(changes.tags, TagUpdate::Replace(_)) {
                let keep: BTreeSet<i64> = resolved.iter().map(|tag| tag.id).collect();
                state
                    .links
                    .retain(|(translation_id, tag_id)| *translation_id != id || keep.contains(tag_id));
            }
            for tag in resolved {
                state.links.insert((id, tag.id));
            }
        }

        let row = state
            .translations
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        if let Some(content) = &changes.content {
            row.content = content.clone();
        }
        row.updated_at = Utc::now();
        let row = row.clone();

        Ok(state.load(&row))
    }

    async fn delete_translation(&self, id: TranslationId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let row = state
            .translations
            .remove(&id)
            .ok_or(StoreError::NotFound(id))?;
        state.identities.remove(&(row.locale, row.key));
        state.links.retain(|(translation_id, _)| *translation_id != id);
        Ok(())
    }

    async fn resolve_or_create_tag(&self, name: &TagName) -> Result<Tag, StoreError> {
        Ok(self.state.write().await.resolve_tag(name))
    }

    async fn find_tag(&self, name: &TagName) -> Result<Option<Tag>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .tag_ids
            .get(name.as_str())
            .and_then(|id| state.tags.get(id))
            .cloned())
    }

    async fn search_translations(&self, query: &SearchQuery) -> Result<Vec<Translation>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .translations
            .values()
            .map(|row| state.load(row))
            .filter(|translation| query.matches(translation))
            .collect())
    }

    async fn translations_by_tag(&self, name: &TagName) -> Result<Vec<Translation>, StoreError> {
        let state = self.state.read().await;
        let Some(tag_id) = state.tag_ids.get(name.as_str()).copied() else {
            return Ok(Vec::new());
        };
        let rows = state
            .translations
            .values()
            .filter(|row| state.links.contains(&(row.id, tag_id)));
        Ok(state.load_all(rows))
    }

    async fn snapshot(&self) -> Result<Vec<Translation>, StoreError> {
        let state = self.state.read().await;
        Ok(state.load_all(state.translations.values()))
    }
}

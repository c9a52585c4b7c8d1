//! Tag identity and the registry that links tags to translations.
//!
//! Tag names are case-insensitive: every name is trimmed and lower-cased
//! before it reaches the store, so `"Greeting"`, `" greeting "` and
//! `"GREETING"` all resolve to the same tag row.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::model::{Tag, Translation, TranslationChanges, TranslationId};
use crate::store::{StoreError, TranslationStore};

/// Longest tag name accepted, counted in characters after normalization
pub const MAX_TAG_NAME_LEN: usize = 255;

/// A normalized tag name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TagName(String);

impl TagName {
    /// Normalize a raw name, rejecting blank or overlong input.
    ///
    /// Length is measured on the trimmed input; lower-casing can expand a
    /// character (`İ` becomes two) and does not count against the limit.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("Tag names must not be empty.".to_string());
        }
        if trimmed.chars().count() > MAX_TAG_NAME_LEN {
            return Err(format!(
                "Tag names may not be greater than {} characters.",
                MAX_TAG_NAME_LEN
            ));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Set of normalized names; duplicates collapse on insert
pub type TagSet = BTreeSet<TagName>;

/// Parse every raw name, collecting one message per rejected entry.
pub fn parse_tag_set<I, S>(names: I) -> Result<TagSet, Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut set = TagSet::new();
    let mut errors = Vec::new();

    for (index, raw) in names.into_iter().enumerate() {
        match TagName::parse(raw.as_ref()) {
            Ok(name) => {
                set.insert(name);
            }
            Err(message) => errors.push(format!("tags.{}: {}", index, message)),
        }
    }

    if errors.is_empty() {
        Ok(set)
    } else {
        Err(errors)
    }
}

/// How a write treats the translation's existing tag links.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TagUpdate {
    /// Leave links untouched
    #[default]
    Keep,
    /// Union of current and given names
    Add(TagSet),
    /// Exactly the given names; everything else is unlinked
    Replace(TagSet),
}

impl TagUpdate {
    /// Resulting link set when applied to `current`
    pub fn apply(&self, current: &TagSet) -> TagSet {
        match self {
            TagUpdate::Keep => current.clone(),
            TagUpdate::Add(names) => current.union(names).cloned().collect(),
            TagUpdate::Replace(names) => names.clone(),
        }
    }

    /// Names that must exist as tag rows after this update
    pub fn names(&self) -> Option<&TagSet> {
        match self {
            TagUpdate::Keep => None,
            TagUpdate::Add(names) | TagUpdate::Replace(names) => Some(names),
        }
    }
}

/// Resolves tag names to rows and maintains translation links.
///
/// Creation of missing tags happens inside the store's write for the owning
/// translation, so a link and the tag it points at commit together.
#[derive(Clone)]
pub struct TagRegistry {
    store: Arc<dyn TranslationStore>,
}

impl TagRegistry {
    pub fn new(store: Arc<dyn TranslationStore>) -> Self {
        Self { store }
    }

    /// Fetch the tag called `name`, creating it if this is the first reference.
    pub async fn resolve_or_create(&self, name: &TagName) -> Result<Tag, StoreError> {
        self.store.resolve_or_create_tag(name).await
    }

    /// Look up a tag without creating it
    pub async fn find(&self, name: &TagName) -> Result<Option<Tag>, StoreError> {
        self.store.find_tag(name).await
    }

    /// Add `names` to the translation's current links.
    pub async fn link_additive(
        &self,
        id: TranslationId,
        names: TagSet,
    ) -> Result<Translation, StoreError> {
        self.store
            .update_translation(id, &TranslationChanges::tags(TagUpdate::Add(names)))
            .await
    }

    /// Make `names` the translation's exact link set.
    pub async fn link_replacing(
        &self,
        id: TranslationId,
        names: TagSet,
    ) -> Result<Translation, StoreError> {
        self.store
            .update_translation(id, &TranslationChanges::tags(TagUpdate::Replace(names)))
            .await
    }
}

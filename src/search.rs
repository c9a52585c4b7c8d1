//! Free-text and tag queries over the store.
//!
//! Matching is case-insensitive substring ("contains") over the locale, the
//! key and the content's string leaves. A blank query is not a search: it
//! yields nothing rather than every row.
//!
//! Case folding happens here, in Rust, for both the query and the searched
//! document. SQL engines persist the folded document and compare it with
//! plain `LIKE`.

use std::sync::Arc;

use tracing::debug;

use crate::model::{Content, Translation};
use crate::store::{StoreError, TranslationStore};
use crate::tags::TagName;

/// Lower-cased text that free-text search matches: locale, key and the
/// content's string leaves, one per line.
pub fn search_document(locale: &str, key: &str, content: &Content) -> String {
    format!("{}\n{}\n{}", locale, key, content.search_text()).to_lowercase()
}

/// A trimmed, lower-cased, non-empty free-text query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    needle: String,
}

impl SearchQuery {
    /// `None` for absent, empty or whitespace-only input
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let needle = raw?.trim().to_lowercase();
        if needle.is_empty() {
            None
        } else {
            Some(Self { needle })
        }
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    /// `LIKE` pattern with `%`, `_` and `\` escaped so they match literally
    pub fn like_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.needle.len() + 2);
        pattern.push('%');
        for c in self.needle.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        pattern
    }

    /// `document` must already be folded by [`search_document`]
    pub fn matches_document(&self, document: &str) -> bool {
        document.contains(&self.needle)
    }

    pub fn matches(&self, translation: &Translation) -> bool {
        self.matches_document(&search_document(
            &translation.locale,
            &translation.key,
            &translation.content,
        ))
    }
}

#[derive(Clone)]
pub struct SearchIndex {
    store: Arc<dyn TranslationStore>,
}

impl SearchIndex {
    pub fn new(store: Arc<dyn TranslationStore>) -> Self {
        Self { store }
    }

    pub async fn free_text(&self, raw: Option<&str>) -> Result<Vec<Translation>, StoreError> {
        let Some(query) = SearchQuery::parse(raw) else {
            debug!("Blank search query, returning no results");
            return Ok(Vec::new());
        };
        self.store.search_translations(&query).await
    }

    /// Translations linked to the named tag; unknown or blank names match nothing
    pub async fn by_tag(&self, raw: &str) -> Result<Vec<Translation>, StoreError> {
        match TagName::parse(raw) {
            Ok(name) => self.store.translations_by_tag(&name).await,
            Err(_) => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn translation(locale: &str, key: &str, content: &str) -> Translation {
        Translation {
            id: 1,
            locale: locale.to_string(),
            key: key.to_string(),
            content: Content::from(content),
            tags: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_blank_queries_are_not_searches() {
        assert!(SearchQuery::parse(None).is_none());
        assert!(SearchQuery::parse(Some("")).is_none());
        assert!(SearchQuery::parse(Some("   \t")).is_none());
    }

    #[test]
    fn test_query_is_trimmed_and_lowercased() {
        let query = SearchQuery::parse(Some("  WeLcome ")).unwrap();
        assert_eq!(query.needle(), "welcome");
    }

    #[test]
    fn test_matches_content_case_insensitively() {
        let query = SearchQuery::parse(Some("welcome")).unwrap();
        assert!(query.matches(&translation("en", "greeting", "Welcome")));
    }

    #[test]
    fn test_matches_key_and_locale() {
        let t = translation("pt-BR", "checkout.button", "Comprar");
        assert!(SearchQuery::parse(Some("CHECKOUT")).unwrap().matches(&t));
        assert!(SearchQuery::parse(Some("pt-br")).unwrap().matches(&t));
        assert!(!SearchQuery::parse(Some("cart")).unwrap().matches(&t));
    }

    #[test]
    fn test_object_keys_are_not_searched() {
        let mut t = translation("en", "k", "x");
        t.content = Content::parse(serde_json::json!({"farewell": "Bye"})).unwrap();
        assert!(!SearchQuery::parse(Some("farewell")).unwrap().matches(&t));
        assert!(SearchQuery::parse(Some("bye")).unwrap().matches(&t));
    }

    #[test]
    fn test_non_ascii_case_is_folded() {
        let t = translation("de", "farewell", "TSCHÜSS");
        assert!(SearchQuery::parse(Some("tschüss")).unwrap().matches(&t));
        assert!(SearchQuery::parse(Some("Tschüss")).unwrap().matches(&t));
    }

    #[test]
    fn test_search_document_is_lowercased() {
        let content = Content::parse(serde_json::json!({"de": "ÄRGER", "en": "Trouble"})).unwrap();
        let document = search_document("DE", "Error.Title", &content);
        assert!(document.contains("de"));
        assert!(document.contains("error.title"));
        assert!(document.contains("ärger"));
        assert!(document.contains("trouble"));
        assert_eq!(document, document.to_lowercase());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        let query = SearchQuery::parse(Some("100%_off\\")).unwrap();
        assert_eq!(query.like_pattern(), "%100\\%\\_off\\\\%");
    }

    #[test]
    fn test_like_pattern_plain() {
        let query = SearchQuery::parse(Some("Hello")).unwrap();
        assert_eq!(query.like_pattern(), "%hello%");
    }

    proptest! {
        #[test]
        fn prop_any_substring_of_key_matches(
            key in "[a-zA-Z0-9_.]{1,30}",
            start in 0usize..30,
            len in 1usize..30,
        ) {
            let start = start.min(key.len() - 1);
            let end = (start + len).min(key.len());
            let needle = &key[start..end];
            prop_assume!(!needle.trim().is_empty());

            let t = translation("en", &key, "unrelated");
            let query = SearchQuery::parse(Some(needle)).unwrap();
            prop_assert!(query.matches(&t));
        }
    }
}

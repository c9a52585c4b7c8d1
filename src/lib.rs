//! Translation management service.
//!
//! Stores localized entries keyed by (locale, key), tags them through a
//! many-to-many relation, and answers free-text, tag and export queries.
//!
//! # Layout
//!
//! - `store`: persistence boundary (`MemoryStore`, `PostgresStore`)
//! - `tags`: tag name normalization and the tag registry
//! - `search`: free-text and tag queries
//! - `service`: the operations callers use
//! - `api`: axum router exposing the service over HTTP
//! - `export`: snapshot file format used by the `export` and `import` binaries

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod retry;
pub mod search;
pub mod security;
pub mod service;
pub mod store;
pub mod tags;

pub use error::{ServiceError, ValidationErrors};
pub use model::{AssignTags, Content, CreateTranslation, Tag, Translation, UpdateTranslation};
pub use service::{TranslationService, DELETED_MESSAGE};

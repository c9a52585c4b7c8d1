use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, PgConnection};
use tracing::{debug, info};

use super::{StoreError, TranslationStore};
use crate::model::{Content, NewTranslation, Tag, Translation, TranslationChanges, TranslationId};
use crate::retry::{with_retry, RetryConfig};
use crate::search::{search_document, SearchQuery};
use crate::tags::{TagName, TagUpdate};

const TRANSLATION_COLUMNS: &str =
    "translations.id, translations.locale, translations.key, translations.content, \
     translations.created_at, translations.updated_at";

#[derive(Debug, FromRow)]
struct TranslationRow {
    id: i64,
    locale: String,
    key: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TagRow {
    id: i64,
    name: String,
}

#[derive(Debug, FromRow)]
struct LinkRow {
    translation_id: i64,
    id: i64,
    name: String,
}

/// PostgreSQL engine.
///
/// Row-level exclusivity comes from `SELECT ... FOR UPDATE` on the
/// translation row; tag creation relies on the `UNIQUE(name)` constraint.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect (retrying while the database comes up) and ensure the schema exists
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = with_retry(&RetryConfig::database_connect(), "PostgreSQL connect", || {
            PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(database_url)
        })
        .await
        .context("Failed to connect to PostgreSQL")?;

        let store = Self::from_pool(pool);
        store
            .migrate()
            .await
            .context("Failed to create database schema")?;

        info!("✓ Connected to PostgreSQL");
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes (safe to run always)
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translations (
                id BIGSERIAL PRIMARY KEY,
                locale TEXT NOT NULL,
                key TEXT NOT NULL,
                content TEXT NOT NULL,
                search_text TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT translations_locale_key_unique UNIQUE (locale, key)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tags (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translation_tag (
                translation_id BIGINT NOT NULL REFERENCES translations(id) ON DELETE CASCADE,
                tag_id BIGINT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (translation_id, tag_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_translation_tag_tag ON translation_tag(tag_id)")
            .execute(&self.pool)
            .await?;

        // Tables created before search_text replaced content_text
        sqlx::query(
            "ALTER TABLE translations ADD COLUMN IF NOT EXISTS search_text TEXT NOT NULL DEFAULT ''",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("ALTER TABLE translations DROP COLUMN IF EXISTS content_text")
            .execute(&self.pool)
            .await?;
        self.backfill_search_text().await?;

        Ok(())
    }

    /// Rebuild `search_text` for rows that have none. Locale is never empty,
    /// so an empty document only comes from a row written before the column.
    async fn backfill_search_text(&self) -> Result<usize, StoreError> {
        let sql = format!(
            "SELECT {} FROM translations WHERE search_text = ''",
            TRANSLATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, TranslationRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        for row in &rows {
            let content = Content::from_storage(&row.content).map_err(|e| {
                StoreError::Corrupt(format!("translation {} content: {}", row.id, e))
            })?;
            sqlx::query("UPDATE translations SET search_text = $2 WHERE id = $1")
                .bind(row.id)
                .bind(search_document(&row.locale, &row.key, &content))
                .execute(&self.pool)
                .await?;
        }

        if !rows.is_empty() {
            info!("Rebuilt search text for {} translations", rows.len());
        }
        Ok(rows.len())
    }

    async fn fetch_where(
        &self,
        condition: &str,
        bind: Option<&str>,
    ) -> Result<Vec<Translation>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {} FROM translations {} ORDER BY translations.id",
            TRANSLATION_COLUMNS, condition
        );
        let mut query = sqlx::query_as::<_, TranslationRow>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&mut *conn).await?;
        assemble(&mut conn, rows).await
    }
}

/// Create-or-fetch a tag row. `ON CONFLICT DO NOTHING` waits for any
/// concurrent insert of the same name, so the follow-up select always finds
/// exactly one committed row.
async fn resolve_tag(conn: &mut PgConnection, name: &TagName) -> Result<Tag, sqlx::Error> {
    sqlx::query("INSERT INTO tags (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
        .bind(name.as_str())
        .execute(&mut *conn)
        .await?;

    let row = sqlx::query_as::<_, TagRow>("SELECT id, name FROM tags WHERE name = $1")
        .bind(name.as_str())
        .fetch_one(&mut *conn)
        .await?;

    Ok(Tag {
        id: row.id,
        name: row.name,
    })
}

async fn link_tag(
    conn: &mut PgConnection,
    translation_id: TranslationId,
    tag_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO translation_tag (translation_id, tag_id) VALUES ($1, $2)
         ON CONFLICT DO NOTHING",
    )
    .bind(translation_id)
    .bind(tag_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Attach tags to rows, one query for the whole batch
async fn assemble(
    conn: &mut PgConnection,
    rows: Vec<TranslationRow>,
) -> Result<Vec<Translation>, StoreError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let links = sqlx::query_as::<_, LinkRow>(
        "SELECT translation_tag.translation_id, tags.id, tags.name
         FROM translation_tag
         JOIN tags ON tags.id = translation_tag.tag_id
         WHERE translation_tag.translation_id = ANY($1)
         ORDER BY tags.name",
    )
    .bind(&ids[..])
    .fetch_all(&mut *conn)
    .await?;

    let mut tags_by_translation: HashMap<i64, Vec<Tag>> = HashMap::new();
    for link in links {
        tags_by_translation
            .entry(link.translation_id)
            .or_default()
            .push(Tag {
                id: link.id,
                name: link.name,
            });
    }

    rows.into_iter()
        .map(|row| {
            let content = Content::from_storage(&row.content).map_err(|e| {
                StoreError::Corrupt(format!("translation {} content: {}", row.id, e))
            })?;
            Ok(Translation {
                tags: tags_by_translation.remove(&row.id).unwrap_or_default(),
                id: row.id,
                locale: row.locale,
                key: row.key,
                content,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
        })
        .collect()
}

async fn assemble_one(
    conn: &mut PgConnection,
    row: TranslationRow,
) -> Result<Translation, StoreError> {
    let id = row.id;
    assemble(conn, vec![row])
        .await?
        .pop()
        .ok_or(StoreError::NotFound(id))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl TranslationStore for PostgresStore {
    async fn list_translations(&self) -> Result<Vec<Translation>, StoreError> {
        self.fetch_where("", None).await
    }

    async fn get_translation(&self, id: TranslationId) -> Result<Option<Translation>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {} FROM translations WHERE id = $1", TRANSLATION_COLUMNS);
        let row = sqlx::query_as::<_, TranslationRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Some(assemble_one(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn insert_translation(&self, new: &NewTranslation) -> Result<Translation, StoreError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO translations (locale, key, content, search_text, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             RETURNING {}",
            TRANSLATION_COLUMNS
        );
        let row = sqlx::query_as::<_, TranslationRow>(&sql)
            .bind(&new.locale)
            .bind(&new.key)
            .bind(new.content.to_storage())
            .bind(search_document(&new.locale, &new.key, &new.content))
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict {
                        locale: new.locale.clone(),
                        key: new.key.clone(),
                    }
                } else {
                    StoreError::Database(e)
                }
            })?;

        for name in &new.tags {
            let tag = resolve_tag(&mut tx, name).await?;
            link_tag(&mut tx, row.id, tag.id).await?;
        }

        let translation = assemble_one(&mut tx, row).await?;
        tx.commit().await?;

        debug!(
            "Inserted translation {} ({}/{})",
            translation.id, translation.locale, translation.key
        );
        Ok(translation)
    }

    async fn update_translation(
        &self,
        id: TranslationId,
        changes: &TranslationChanges,
    ) -> Result<Translation, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serializes against concurrent updates, tag assignments and deletes
        let locked: Option<(String, String)> =
            sqlx::query_as("SELECT locale, key FROM translations WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((locale, key)) = locked else {
            return Err(StoreError::NotFound(id));
        };

        if let Some(names) = changes.tags.names() {
            let mut tag_ids = Vec::with_capacity(names.len());
            for name in names {
                let tag = resolve_tag(&mut tx, name).await?;
                link_tag(&mut tx, id, tag.id).await?;
                tag_ids.push(tag.id);
            }

            if matches!(changes.tags, TagUpdate::Replace(_)) {
                sqlx::query(
                    "DELETE FROM translation_tag
                     WHERE translation_id = $1 AND NOT (tag_id = ANY($2))",
                )
                .bind(id)
                .bind(&tag_ids[..])
                .execute(&mut *tx)
                .await?;
            }
        }

        let sql = format!(
            "UPDATE translations
             SET content = COALESCE($2, content),
                 search_text = COALESCE($3, search_text),
                 updated_at = $4
             WHERE id = $1
             RETURNING {}",
            TRANSLATION_COLUMNS
        );
        let row = sqlx::query_as::<_, TranslationRow>(&sql)
            .bind(id)
            .bind(changes.content.as_ref().map(Content::to_storage))
            .bind(
                changes
                    .content
                    .as_ref()
                    .map(|content| search_document(&locale, &key, content)),
            )
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;

        let translation = assemble_one(&mut tx, row).await?;
        tx.commit().await?;
        Ok(translation)
    }

    async fn delete_translation(&self, id: TranslationId) -> Result<(), StoreError> {
        // Links go with the row via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM translations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn resolve_or_create_tag(&self, name: &TagName) -> Result<Tag, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(resolve_tag(&mut conn, name).await?)
    }

    async fn find_tag(&self, name: &TagName) -> Result<Option<Tag>, StoreError> {
        let row = sqlx::query_as::<_, TagRow>("SELECT id, name FROM tags WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Tag {
            id: row.id,
            name: row.name,
        }))
    }

    async fn search_translations(&self, query: &SearchQuery) -> Result<Vec<Translation>, StoreError> {
        // Document and pattern are both folded already
        let pattern = query.like_pattern();
        self.fetch_where(
            r"WHERE translations.search_text LIKE $1 ESCAPE '\'",
            Some(&pattern),
        )
        .await
    }

    async fn translations_by_tag(&self, name: &TagName) -> Result<Vec<Translation>, StoreError> {
        self.fetch_where(
            "JOIN translation_tag ON translation_tag.translation_id = translations.id
             JOIN tags ON tags.id = translation_tag.tag_id
             WHERE tags.name = $1",
            Some(name.as_str()),
        )
        .await
    }

    async fn snapshot(&self) -> Result<Vec<Translation>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "SELECT {} FROM translations ORDER BY translations.id",
            TRANSLATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, TranslationRow>(&sql)
            .fetch_all(&mut *tx)
            .await?;
        let translations = assemble(&mut tx, rows).await?;
        tx.commit().await?;

        Ok(translations)
    }
}

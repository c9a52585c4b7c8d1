//! Snapshot file format for bulk export and re-import.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::model::{CreateTranslation, Translation};
use crate::service::TranslationService;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportFile {
    pub exported_at: DateTime<Utc>,
    pub count: usize,
    pub translations: Vec<Translation>,
}

impl ExportFile {
    pub fn new(translations: Vec<Translation>) -> Self {
        Self {
            exported_at: Utc::now(),
            count: translations.len(),
            translations,
        }
    }

    /// Write pretty-printed JSON, creating parent directories as needed
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize export")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write export to {}", path.display()))?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read export file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid export file {}", path.display()))
    }

    /// One create request per exported translation; ids and timestamps are dropped
    pub fn create_requests(&self) -> Vec<CreateTranslation> {
        self.translations
            .iter()
            .map(|t| CreateTranslation {
                locale: Some(t.locale.clone()),
                key: Some(t.key.clone()),
                content: Some(t.content.as_value().clone()),
                tags: Some(t.tags.iter().map(|tag| tag.name.clone()).collect()),
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    /// Entries whose (locale, key) already existed
    pub skipped: usize,
}

/// Replay an export through `create_translation`. Existing identities are
/// skipped; any other failure stops the import.
pub async fn import(
    service: &TranslationService,
    file: &ExportFile,
) -> Result<ImportReport, ServiceError> {
    let mut report = ImportReport::default();

    for request in file.create_requests() {
        match service.create_translation(request).await {
            Ok(_) => report.created += 1,
            Err(ServiceError::Conflict { locale, key }) => {
                warn!("Skipping existing translation {}/{}", locale, key);
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "Import finished: {} created, {} skipped",
        report.created, report.skipped
    );
    Ok(report)
}

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;
use translation_service::export::{self, ExportFile};
use translation_service::{config, store, TranslationService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("import=info".parse()?)
                .add_directive("translation_service=warn".parse()?),
        )
        .init();

    let config = config::Config::from_env()?;

    let input_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.export_path));

    let file = ExportFile::read_from(&input_path)?;
    info!(
        "Importing {} translations exported at {}",
        file.count, file.exported_at
    );

    let service = TranslationService::new(store::connect(&config).await?);
    let report = export::import(&service, &file)
        .await
        .context("Import aborted")?;

    info!(
        "✓ Imported {} translations ({} already present)",
        report.created, report.skipped
    );
    Ok(())
}

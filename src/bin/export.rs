use anyhow::Result;
use std::path::PathBuf;
use tracing::info;
use translation_service::export::ExportFile;
use translation_service::{config, store, TranslationService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("export=info".parse()?)
                .add_directive("translation_service=info".parse()?),
        )
        .init();

    let config = config::Config::from_env()?;

    // First argument overrides EXPORT_PATH
    let output_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.export_path));

    info!("Exporting translations to {}", output_path.display());

    let service = TranslationService::new(store::connect(&config).await?);
    let file = ExportFile::new(service.export_translations().await?);
    file.write_to(&output_path)?;

    info!("✓ Exported {} translations to {}", file.count, output_path.display());
    Ok(())
}

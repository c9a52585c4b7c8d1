use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: String,
    pub database_max_connections: u32,

    // Auth
    pub api_key: Option<String>,

    // Server
    pub port: u16,

    // Export/import tooling
    pub export_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(v) => v
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            Err(_) => 5,
        };
        if database_max_connections == 0 {
            bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        Ok(Self {
            // Storage - a postgres:// URL, or memory:// for a throwaway store
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            database_max_connections,

            // Auth - empty is the same as unset
            api_key: std::env::var("API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            // Server
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            export_path: std::env::var("EXPORT_PATH")
                .unwrap_or_else(|_| "data/translations.json".to_string()),
        })
    }
}

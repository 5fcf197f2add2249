use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::engine::EngineConfig;

pub const DB_ENV: &str = "BUDGETSNAP_DB";
pub const MAX_CHAIN_ENV: &str = "BUDGETSNAP_MAX_CHAIN";
pub const LOG_ENV: &str = "BUDGETSNAP_LOG";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through `lookup`, falling back to the platform data directory.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = match lookup(DB_ENV).filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(crate::run::shellexpand(path.trim())),
            None => default_db_path()?,
        };

        let max_chain_len = lookup(MAX_CHAIN_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                v.trim()
                    .parse::<u32>()
                    .with_context(|| format!("{MAX_CHAIN_ENV} must be a whole number, got '{v}'"))
            })
            .transpose()?;

        Ok(Self {
            db_path,
            engine: EngineConfig { max_chain_len },
        })
    }
}

fn default_db_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "budgetsnap", "budgetsnap")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("budgetsnap.db"))
}

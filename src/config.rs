//! Configuration management.
//!
//! Settings come from an optional `gtinfill.toml` in the data directory,
//! with every field defaulting sensibly so a bare `gtinfill serve` works
//! out of the box. Environment overrides are handled at the CLI layer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::repository::{DocumentStore, MemoryStore, SqliteStore};
use crate::scrapers::FetcherConfig;

/// Configuration file name, looked up inside the data directory.
pub const CONFIG_FILE: &str = "gtinfill.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the database and config file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Control server bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Control server bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Keep everything in memory; nothing touches disk. Queue and
    /// catalog are lost on exit.
    #[serde(default)]
    pub ephemeral: bool,

    /// Fetcher configuration (lookup host, browser options).
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            host: default_host(),
            port: default_port(),
            ephemeral: false,
            fetcher: FetcherConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings, optionally overriding the data directory.
    ///
    /// Reads `<data_dir>/gtinfill.toml` when present; missing files mean
    /// defaults, a malformed file is an error rather than a silent
    /// fallback.
    pub fn load(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let dir = data_dir.clone().unwrap_or_else(default_data_dir);
        let config_path = dir.join(CONFIG_FILE);

        let mut settings = if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("invalid {}: {}", config_path.display(), e))?
        } else {
            Self::default()
        };

        if let Some(dir) = data_dir {
            settings.data_dir = dir;
        }
        Ok(settings)
    }

    /// Path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("catalog.db")
    }

    /// Open the configured document store backend.
    pub fn open_store(&self) -> anyhow::Result<Arc<dyn DocumentStore>> {
        if self.ephemeral {
            Ok(Arc::new(MemoryStore::new()))
        } else {
            Ok(Arc::new(SqliteStore::open(&self.database_path())?))
        }
    }

    /// Write the current settings out as a commented starter config.
    pub fn write_default_config(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILE);
        let rendered = toml::to_string_pretty(self)?;
        std::fs::write(&path, rendered)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let settings = Settings::default();
        assert_eq!(settings.port, 5000);
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert!(!settings.ephemeral);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(settings.data_dir, dir.path());
        assert_eq!(settings.host, "127.0.0.1");
    }

    #[test]
    fn load_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "port = 8080\nephemeral = true\n\n[fetcher]\nbase_url = \"https://example.org\"\n",
        )
        .unwrap();

        let settings = Settings::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(settings.port, 8080);
        assert!(settings.ephemeral);
        assert_eq!(settings.fetcher.base_url, "https://example.org");
    }

    #[test]
    fn load_rejects_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "port = \"not a number\"").unwrap();
        assert!(Settings::load(Some(dir.path().to_path_buf())).is_err());
    }

    #[test]
    fn write_default_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default();
        let path = settings.write_default_config(dir.path()).unwrap();
        assert!(path.exists());

        let reloaded = Settings::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(reloaded.port, settings.port);
    }
}

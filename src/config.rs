// ⚙️ Configuration - store parameters, server settings and CSV sources
//
// Resolution order (highest wins):
//   1. CLI flags (applied by the binaries)
//   2. Environment variables SAT_DB_PATH, SAT_BIND, SAT_REPORT_DIR
//   3. TOML config file (default: sat.toml, optional)
//   4. Compiled defaults

use crate::error::{Result, SatError};
use crate::tables::SatTable;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "sat.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,
    /// Maximum pooled connections
    pub pool_size: u32,
    /// How long a request waits for a connection before giving up
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Where uploads are staged and reconciliation reports are written
    pub report_dir: PathBuf,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Leading lines to drop before the CSV header
    pub skip_rows: usize,
    /// Destination table name → CSV path
    pub files: BTreeMap<String, PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sat.db"),
            pool_size: 8,
            connect_timeout_secs: 5,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8091".to_string(),
            report_dir: PathBuf::from("uploads"),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            skip_rows: 0,
            files: BTreeMap::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            import: ImportConfig::default(),
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

impl ImportConfig {
    /// Configured sources resolved against the table allow-list, in fixed table order
    pub fn sources(&self) -> Result<Vec<(SatTable, PathBuf)>> {
        let mut sources = self
            .files
            .iter()
            .map(|(name, path)| {
                SatTable::from_slug(name)
                    .map(|table| (table, path.clone()))
                    .map_err(|_| SatError::Config(format!("unknown table in [import.files]: {}", name)))
            })
            .collect::<Result<Vec<_>>>()?;

        sources.sort_by_key(|(table, _)| *table);
        Ok(sources)
    }
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SatError::Config(e.to_string()))
    }

    /// Load configuration from `path` (or the default file when present), then apply env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    SatError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                info!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&content)?
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    let content = std::fs::read_to_string(default_path)?;
                    info!("Loaded configuration from {}", default_path.display());
                    Self::from_toml_str(&content)?
                } else {
                    debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.import.sources()?;
        Ok(config)
    }

    /// Environment overrides; `lookup` abstracts `std::env::var` for tests
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("SAT_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(bind) = lookup("SAT_BIND") {
            self.server.bind = bind;
        }
        if let Some(dir) = lookup("SAT_REPORT_DIR") {
            self.server.report_dir = PathBuf::from(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "0.0.0.0:8091");
        assert_eq!(config.server.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.import.skip_rows, 0);
        assert!(config.import.files.is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [database]
            path = "/var/lib/sat/sat.db"

            [import]
            skip_rows = 2

            [import.files]
            Presuntos = "data/Presuntos.csv"
            Listado_Completo_69_B = "data/Listado_Completo_69-B.csv"
            Definitivos = "data/Definitivos.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/var/lib/sat/sat.db"));
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.import.skip_rows, 2);

        let sources = config.import.sources().unwrap();
        let tables: Vec<SatTable> = sources.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            tables,
            vec![SatTable::Definitivos, SatTable::Presuntos, SatTable::ListadoCompleto69B]
        );
    }

    #[test]
    fn test_unknown_import_table_is_rejected() {
        let config = AppConfig::from_toml_str(
            r#"
            [import.files]
            usuarios = "data/usuarios.csv"
            "#,
        )
        .unwrap();

        assert!(matches!(config.import.sources(), Err(SatError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            "SAT_DB_PATH" => Some("/tmp/other.db".to_string()),
            "SAT_BIND" => Some("127.0.0.1:9000".to_string()),
            _ => None,
        });

        assert_eq!(config.database.path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.server.report_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            AppConfig::from_toml_str("[database\npath = 1"),
            Err(SatError::Config(_))
        ));
    }
}

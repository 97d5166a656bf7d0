use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, WhereaboutsError};

/// Environment variable holding a comma-separated list of privileged user ids.
pub const ADMIN_IDS_ENV: &str = "WHEREABOUTS_ADMIN_IDS";
/// Environment variable overriding `storage.db_file`.
pub const DB_PATH_ENV: &str = "WHEREABOUTS_DB_PATH";

/// Top-level configuration for the Whereabouts bot.
///
/// Loaded from `~/.whereabouts/config.toml` by default. Every section is
/// optional in the file; missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhereaboutsConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub dialog: DialogConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl WhereaboutsConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WhereaboutsConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| WhereaboutsError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using an arbitrary variable lookup.
    ///
    /// `WHEREABOUTS_ADMIN_IDS` replaces the admin list only when it yields
    /// at least one valid id.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ADMIN_IDS_ENV) {
            let ids = parse_admin_ids(&raw);
            if !ids.is_empty() {
                self.access.admin_ids = ids;
            }
        }
        if let Some(path) = lookup(DB_PATH_ENV) {
            if !path.trim().is_empty() {
                self.storage.db_file = path.trim().to_string();
            }
        }
    }
}

/// Parse a comma-separated list of user ids, skipping malformed entries.
pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(entry = s, "Ignoring malformed admin id");
                None
            }
        })
        .collect()
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the database and exported spreadsheets.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Offset of the team's wall clock from UTC, in hours.
    pub utc_offset_hours: i32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.whereabouts/data".to_string(),
            log_level: "info".to_string(),
            utc_offset_hours: 3,
        }
    }
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. Relative paths resolve against `general.data_dir`.
    pub db_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_file: "whereabouts.db".to_string(),
        }
    }
}

impl StorageConfig {
    /// Resolve the database path against the data directory.
    pub fn db_path(&self, data_dir: &Path) -> PathBuf {
        let file = Path::new(&self.db_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            data_dir.join(file)
        }
    }
}

/// Privileged operations (roster import, spreadsheet export).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// User ids allowed to import and export.
    pub admin_ids: Vec<i64>,
}

/// Conversation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    /// Minutes of inactivity after which a multi-step session is dropped.
    pub session_ttl_minutes: u32,
    /// Ask before overwriting a same-kind record that already exists today.
    pub confirm_overwrites: bool,
    /// Words that stand for the current time.
    pub now_keywords: Vec<String>,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: 30,
            confirm_overwrites: false,
            now_keywords: vec!["сейчас".to_string(), "now".to_string()],
        }
    }
}

/// Spreadsheet export settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory for exported workbooks. Empty means `<data_dir>/exports`.
    pub output_dir: String,
}

impl ExportConfig {
    pub fn resolve_dir(&self, data_dir: &Path) -> PathBuf {
        if self.output_dir.trim().is_empty() {
            data_dir.join("exports")
        } else {
            PathBuf::from(&self.output_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = WhereaboutsConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.utc_offset_hours, 3);
        assert_eq!(config.storage.db_file, "whereabouts.db");
        assert!(config.access.admin_ids.is_empty());
        assert_eq!(config.dialog.session_ttl_minutes, 30);
        assert!(!config.dialog.confirm_overwrites);
        assert!(config.dialog.now_keywords.contains(&"сейчас".to_string()));
    }

    #[test]
    fn test_load_partial_toml_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[access]
admin_ids = [42, 7]

[dialog]
session_ttl_minutes = 5
"#
        )
        .unwrap();

        let config = WhereaboutsConfig::load(file.path()).unwrap();
        assert_eq!(config.access.admin_ids, vec![42, 7]);
        assert_eq!(config.dialog.session_ttl_minutes, 5);
        // Unspecified fields inside a present section keep their defaults.
        assert_eq!(config.dialog.now_keywords.len(), 2);
        assert_eq!(config.storage.db_file, "whereabouts.db");
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "access = [[[").unwrap();
        let err = WhereaboutsConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, WhereaboutsError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = WhereaboutsConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.storage.db_file, "whereabouts.db");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = WhereaboutsConfig::default();
        config.access.admin_ids = vec![100];
        config.dialog.confirm_overwrites = true;
        config.save(&path).unwrap();

        let loaded = WhereaboutsConfig::load(&path).unwrap();
        assert_eq!(loaded.access.admin_ids, vec![100]);
        assert!(loaded.dialog.confirm_overwrites);
    }

    // ---- environment overrides ----

    #[test]
    fn test_parse_admin_ids_skips_garbage() {
        assert_eq!(parse_admin_ids("1, 2,abc,,  3 "), vec![1, 2, 3]);
        assert!(parse_admin_ids("").is_empty());
        assert!(parse_admin_ids("x,y").is_empty());
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ADMIN_IDS_ENV, "11,22"),
            (DB_PATH_ENV, "/var/lib/whereabouts/bot.db"),
        ]
        .into_iter()
        .collect();

        let mut config = WhereaboutsConfig::default();
        config.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.access.admin_ids, vec![11, 22]);
        assert_eq!(config.storage.db_file, "/var/lib/whereabouts/bot.db");
    }

    #[test]
    fn test_overrides_ignore_empty_admin_list() {
        let mut config = WhereaboutsConfig::default();
        config.access.admin_ids = vec![5];
        config.apply_overrides_from(|k| (k == ADMIN_IDS_ENV).then(|| "nope".to_string()));
        assert_eq!(config.access.admin_ids, vec![5]);
    }

    #[test]
    fn test_db_path_resolution() {
        let storage = StorageConfig::default();
        assert_eq!(
            storage.db_path(Path::new("/data")),
            PathBuf::from("/data/whereabouts.db")
        );

        let absolute = StorageConfig {
            db_file: "/tmp/other.db".to_string(),
        };
        assert_eq!(
            absolute.db_path(Path::new("/data")),
            PathBuf::from("/tmp/other.db")
        );
    }

    #[test]
    fn test_export_dir_resolution() {
        let export = ExportConfig::default();
        assert_eq!(
            export.resolve_dir(Path::new("/data")),
            PathBuf::from("/data/exports")
        );
    }
}

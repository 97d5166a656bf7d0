//! CLI argument definitions for the Whereabouts binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

pub const CONFIG_ENV: &str = "WHEREABOUTS_CONFIG";

/// Whereabouts - records who left for the day and who is busy elsewhere.
#[derive(Parser, Debug)]
#[command(name = "whereabouts", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory for the database and exports.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Database file (overrides storage.db_file).
    #[arg(long = "db")]
    pub db: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Chat id used by the console transport.
    #[arg(long = "chat-id", default_value_t = 1)]
    pub chat_id: i64,

    /// Sender id used by the console transport.
    #[arg(long = "user-id", default_value_t = 1)]
    pub user_id: i64,

    /// Print outbound messages as JSON lines.
    #[arg(long = "json")]
    pub json: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > WHEREABOUTS_CONFIG env var > ~/.whereabouts/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(std::env::var(CONFIG_ENV).ok())
    }

    fn resolve_config_path_with(&self, env_value: Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env_value.filter(|p| !p.trim().is_empty()) {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory: --data-dir flag > config value.
    pub fn resolve_data_dir(&self, config_value: &str) -> PathBuf {
        match &self.data_dir {
            Some(p) => p.clone(),
            None => expand_home(config_value),
        }
    }

    /// Resolve the log level: --log-level flag > config value.
    pub fn resolve_log_level(&self, config_value: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_value.to_string())
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".whereabouts").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".whereabouts").join("config.toml");
    }
    PathBuf::from("config.toml")
}

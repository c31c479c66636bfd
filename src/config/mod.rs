//! Configuration management for Automedia.
//!
//! Configuration is read from `~/.config/automedia/config.toml` (or the
//! path given with `--config`). If the file doesn't exist, a default
//! configuration with comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::notify::NotificationConfig;
use crate::plugin::PluginConfig;
use crate::torrent::TorrentConfig;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the tracked-source directories (default: `~/.config/automedia`)
    pub data_dir: Option<PathBuf>,
    /// Where plugins live (default: `<data_dir>/plugins`)
    pub plugin_dir: Option<PathBuf>,
    pub sync: SyncConfig,
    pub plugins: PluginConfig,
    pub torrent: TorrentConfig,
    pub notifications: NotificationConfig,
}

/// `[sync]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How often every source is synced (default: "15m")
    pub sync_interval: String,
    /// How often in-flight downloads are checked (default: "15s")
    pub poll_interval: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval: "15m".to_string(),
            poll_interval: "15s".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })?;

        Ok(config)
    }

    /// Get the default config file path: `~/.config/automedia/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::default_data_dir()?.join("config.toml"))
    }

    fn default_data_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("automedia"))
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::default_data_dir(),
        }
    }

    pub fn plugin_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.plugin_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.data_dir()?.join("plugins")),
        }
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# Automedia Configuration
#
# Intervals accept "30s", "15m", "1h", "1d" or a bare number of seconds.

# Where tracked sources are stored (default: this directory)
# data_dir = "/home/me/.config/automedia"

# Where site plugins are looked up (default: <data_dir>/plugins)
# plugin_dir = "/home/me/.config/automedia/plugins"

[sync]
# Check every tracked source for new items
sync_interval = "15m"

# Check running downloads for completion
poll_interval = "15s"

[plugins]
# Kill a plugin listing that runs longer than this (0 = never)
list_timeout_secs = 300

[torrent]
# Transmission RPC endpoint
rpc_url = "http://localhost:9091/transmission/rpc"

# Start transmission-daemon when it is not running
autostart = true

# Seed ratio for a daemon started by automedia
seed_ratio = 2.0

# RPC request timeout in seconds
timeout_secs = 30

[notifications]
# Show desktop notifications through notify-send
enabled = true

# "all" or "finished" (only completed downloads)
level = "all"
"##
        .to_string()
    }
}

/// Parse interval string like "1h", "30m", "6h", "1d" into seconds
pub fn parse_interval(s: &str) -> Result<u64, String> {
    let s = s.trim().to_lowercase();

    if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .map(|h| h * 3600)
            .map_err(|_| format!("Invalid hours: {}", hours))
    } else if let Some(minutes) = s.strip_suffix('m') {
        minutes
            .parse::<u64>()
            .map(|m| m * 60)
            .map_err(|_| format!("Invalid minutes: {}", minutes))
    } else if let Some(days) = s.strip_suffix('d') {
        days.parse::<u64>()
            .map(|d| d * 86400)
            .map_err(|_| format!("Invalid days: {}", days))
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>()
            .map_err(|_| format!("Invalid seconds: {}", secs))
    } else {
        s.parse::<u64>()
            .map_err(|_| format!("Invalid interval: {}. Use format like '15s', '15m', '1h'", s))
    }
}

/// Format interval for display
pub fn format_interval(secs: u64) -> String {
    if secs >= 86400 && secs % 86400 == 0 {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationLevel;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.sync.sync_interval, "15m");
        assert_eq!(config.plugins.list_timeout_secs, 300);
        assert!(config.torrent.autostart);
        assert_eq!(config.notifications.level, NotificationLevel::All);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
plugin_dir = "/opt/plugins"

[notifications]
level = "finished"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        // Custom values
        assert_eq!(config.plugin_dir().unwrap(), PathBuf::from("/opt/plugins"));
        assert_eq!(config.notifications.level, NotificationLevel::Finished);
        // Default values
        assert!(config.notifications.enabled);
        assert_eq!(config.sync.poll_interval, "15s");
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.torrent.seed_ratio, 2.0);
        assert_eq!(config.sync.sync_interval, "15m");
    }

    #[test]
    fn test_plugin_dir_follows_data_dir() {
        let config: Config = toml::from_str(r#"data_dir = "/srv/automedia""#).unwrap();
        assert_eq!(config.plugin_dir().unwrap(), PathBuf::from("/srv/automedia/plugins"));
    }

    #[test]
    fn test_load_creates_default_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.sync.sync_interval, "15m");

        fs::write(&path, "[sync]\npoll_interval = \"30s\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.sync.poll_interval, "30s");
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[sync\n").unwrap();

        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("1h").unwrap(), 3600);
        assert_eq!(parse_interval("15m").unwrap(), 900);
        assert_eq!(parse_interval("1d").unwrap(), 86400);
        assert_eq!(parse_interval("15s").unwrap(), 15);
        assert_eq!(parse_interval("3600").unwrap(), 3600);
        assert_eq!(parse_interval(" 6H ").unwrap(), 21600);
        assert!(parse_interval("invalid").is_err());
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(3600), "1h");
        assert_eq!(format_interval(900), "15m");
        assert_eq!(format_interval(86400), "1d");
        assert_eq!(format_interval(90), "90s");
        assert_eq!(format_interval(15), "15s");
    }
}

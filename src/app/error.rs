use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomediaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source {name} is corrupt: {reason}")]
    SourceCorrupt { name: String, reason: String },

    #[error("Source already exists: {0}")]
    SourceExists(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Item {item:?} was not found in {url}")]
    StartAfterNotFound { item: String, url: String },

    #[error("Plugin doesn't exist: {0}")]
    PluginNotFound(String),

    #[error(transparent)]
    Plugin(#[from] PluginFailure),

    #[error("Download request failed: {0}")]
    DownloadRequest(String),

    #[error("Torrent service error: {0}")]
    Torrent(String),

    #[error("Another sync is already running (PID {pid})")]
    InstanceConflict { pid: u32 },

    #[error("Failed to acquire lock file {path}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Why a plugin call produced no data.
#[derive(Error, Debug)]
pub enum PluginFailure {
    #[error("Failed to launch plugin {plugin}: {source}")]
    Launch {
        plugin: String,
        source: std::io::Error,
    },

    #[error("Plugin {plugin} exited with {status}, stdout: {stdout}, stderr: {stderr}")]
    Exit {
        plugin: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to decode output of plugin {plugin}: {reason}")]
    BadOutput { plugin: String, reason: String },

    #[error("Plugin {plugin} did not finish within {secs}s")]
    TimedOut { plugin: String, secs: u64 },
}

impl AutomediaError {
    pub fn corrupt(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceCorrupt {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AutomediaError>;

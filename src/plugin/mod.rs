//! Content sources: where candidate items come from and how they are fetched.
//!
//! ```text
//! TrackedSource → Resolver → ContentSource ─ list ────→ Vec<CandidateItem>
//!                                          └ download → DownloadHandle
//! ```
//!
//! Page sources are served by external plugin programs ([`PluginSource`]),
//! feed sources by the feed parser plus the torrent service ([`FeedSource`]).

mod feed;
mod process;
pub mod resolve;

pub use feed::FeedSource;
pub use process::PluginSource;
pub use resolve::{find_plugin, url_extract_domain};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::app::{AutomediaError, Result};
use crate::domain::{CandidateItem, SourceKind, TrackedSource};

/// A requested download whose completion the caller does not own.
///
/// Plugin downloads keep running in their own process; the handle only
/// observes the exit.
#[derive(Debug)]
pub struct DownloadHandle {
    exit: Option<JoinHandle<bool>>,
}

impl DownloadHandle {
    /// The request was accepted by a service that tracks completion itself.
    pub fn accepted() -> Self {
        Self { exit: None }
    }

    pub fn spawned(exit: JoinHandle<bool>) -> Self {
        Self { exit: Some(exit) }
    }

    /// Stop observing the download; it keeps running.
    pub fn detach(self) {}

    /// Wait for the download process to exit. `true` on success.
    pub async fn wait(self) -> bool {
        match self.exit {
            Some(exit) => exit.await.unwrap_or(false),
            None => true,
        }
    }
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &str;

    /// List items at `url`, newest first. `seen` is the source's ledger.
    async fn list(&self, url: &str, seen: &[CandidateItem]) -> Result<Vec<CandidateItem>>;

    /// Request a download of the item at `url` into `target_dir`.
    async fn download(&self, url: &str, target_dir: &Path) -> Result<DownloadHandle>;
}

/// Maps a tracked source to the content source serving it.
pub trait Resolver: Send + Sync {
    fn resolve(&self, source: &TrackedSource) -> Result<Arc<dyn ContentSource>>;
}

/// `[plugins]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Kill a `list` call running longer than this; 0 disables (default: 300)
    pub list_timeout_secs: u64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            list_timeout_secs: 300,
        }
    }
}

impl PluginConfig {
    pub fn list_timeout(&self) -> Option<Duration> {
        (self.list_timeout_secs > 0).then(|| Duration::from_secs(self.list_timeout_secs))
    }
}

pub struct DefaultResolver {
    plugin_dir: PathBuf,
    config: PluginConfig,
    feed: Arc<FeedSource>,
}

impl DefaultResolver {
    pub fn new(plugin_dir: PathBuf, config: PluginConfig, feed: Arc<FeedSource>) -> Self {
        Self {
            plugin_dir,
            config,
            feed,
        }
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn plugin_for(&self, plugin: &str) -> Result<PluginSource> {
        let path = self.plugin_dir.join(plugin);
        if !path.is_file() {
            return Err(AutomediaError::PluginNotFound(plugin.to_string()));
        }
        Ok(PluginSource::new(path, self.config.list_timeout()))
    }
}

impl Resolver for DefaultResolver {
    fn resolve(&self, source: &TrackedSource) -> Result<Arc<dyn ContentSource>> {
        match source.kind {
            SourceKind::Feed => Ok(self.feed.clone()),
            SourceKind::Page => {
                let plugin = source
                    .plugin
                    .as_deref()
                    .ok_or_else(|| AutomediaError::corrupt(&source.name, "plugin missing"))?;
                Ok(Arc::new(self.plugin_for(plugin)?))
            }
        }
    }
}

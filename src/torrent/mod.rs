pub mod transmission;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::Result;

pub use transmission::TransmissionClient;

/// Progress within this distance of 100 counts as finished.
pub const FINISHED_TOLERANCE: f64 = 0.001;

/// One torrent as reported by the torrent service.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentEntry {
    /// Stable across polls, unlike `name`.
    pub id: i64,
    pub name: String,
    /// 0.0 ..= 100.0
    pub progress: f64,
}

impl TorrentEntry {
    pub fn is_finished(&self) -> bool {
        (100.0 - self.progress).abs() <= FINISHED_TOLERANCE
    }
}

#[async_trait]
pub trait TorrentClient: Send + Sync {
    async fn add_torrent(&self, url: &str) -> Result<()>;
    async fn list_torrents(&self) -> Result<Vec<TorrentEntry>>;

    /// Make sure the service is reachable, starting it if the client knows how.
    async fn ensure_running(&self, _download_dir: &Path) -> Result<()> {
        Ok(())
    }
}

/// `[torrent]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TorrentConfig {
    /// Transmission RPC endpoint
    pub rpc_url: String,

    /// Launch transmission-daemon when the endpoint is unreachable (default: true)
    pub autostart: bool,

    /// Seed ratio passed to a daemon we start ourselves (default: 2.0)
    pub seed_ratio: f64,

    /// RPC request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for TorrentConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:9091/transmission/rpc".to_string(),
            autostart: true,
            seed_ratio: 2.0,
            timeout_secs: 30,
        }
    }
}

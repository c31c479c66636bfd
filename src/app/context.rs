use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{AutomediaError, Result};
use crate::config::Config;
use crate::daemon::{Daemon, DaemonConfig};
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::Fetcher;
use crate::normalizer::Normalizer;
use crate::notify::Notifications;
use crate::plugin::{DefaultResolver, FeedSource};
use crate::store::fs::FsStore;
use crate::torrent::{TorrentClient, TransmissionClient};

pub struct AppContext {
    pub config: Config,
    pub store: Arc<FsStore>,
    pub feed: Arc<FeedSource>,
    pub torrent: Arc<dyn TorrentClient>,
    pub resolver: Arc<DefaultResolver>,
    pub notifications: Notifications,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let data_dir = config
            .data_dir()
            .map_err(|e| AutomediaError::Config(e.to_string()))?;
        let plugin_dir = config
            .plugin_dir()
            .map_err(|e| AutomediaError::Config(e.to_string()))?;

        let store = Arc::new(FsStore::new(data_dir));
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new()?);
        let torrent: Arc<dyn TorrentClient> =
            Arc::new(TransmissionClient::new(config.torrent.clone())?);
        let feed = Arc::new(FeedSource::new(fetcher, Normalizer::new(), torrent.clone()));
        let resolver = Arc::new(DefaultResolver::new(
            plugin_dir,
            config.plugins.clone(),
            feed.clone(),
        ));
        let notifications = Notifications::desktop(config.notifications.clone());

        Ok(Self {
            config,
            store,
            feed,
            torrent,
            resolver,
            notifications,
        })
    }

    /// A daemon syncing into `download_dir` with the configured intervals.
    pub fn daemon(&self, download_dir: PathBuf) -> Result<Daemon> {
        let config = DaemonConfig::new(download_dir, &self.config.sync)?;
        Ok(Daemon::new(
            self.store.clone(),
            self.resolver.clone(),
            self.torrent.clone(),
            self.notifications.clone(),
            config,
        ))
    }
}

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::CandidateItem;
use crate::fetcher::Fetcher;
use crate::normalizer::{FeedMeta, Normalizer};
use crate::plugin::{ContentSource, DownloadHandle};
use crate::torrent::TorrentClient;

/// Syndication feeds whose items are handed to the torrent service.
pub struct FeedSource {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    normalizer: Normalizer,
    torrent: Arc<dyn TorrentClient>,
}

impl FeedSource {
    pub fn new(
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        normalizer: Normalizer,
        torrent: Arc<dyn TorrentClient>,
    ) -> Self {
        Self {
            fetcher,
            normalizer,
            torrent,
        }
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<(FeedMeta, Vec<CandidateItem>)> {
        let body = self.fetcher.fetch(url).await?;
        self.normalizer.normalize(url, &body)
    }
}

#[async_trait]
impl ContentSource for FeedSource {
    fn name(&self) -> &str {
        "rss"
    }

    async fn list(&self, url: &str, _seen: &[CandidateItem]) -> Result<Vec<CandidateItem>> {
        let (_, items) = self.fetch_feed(url).await?;
        Ok(items)
    }

    /// The torrent service picks the location; `target_dir` is unused.
    async fn download(&self, url: &str, _target_dir: &Path) -> Result<DownloadHandle> {
        self.torrent.add_torrent(url).await?;
        Ok(DownloadHandle::accepted())
    }
}

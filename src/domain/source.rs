use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CandidateItem, DownloadedItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Syndication feed; items are torrent links.
    Feed,
    /// Web page handled by a scraper plugin.
    Page,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Feed, SourceKind::Page];

    /// Directory under the data root holding sources of this kind.
    pub fn dir_name(self) -> &'static str {
        match self {
            SourceKind::Feed => "rss",
            SourceKind::Page => "html",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rss" | "feed" => Ok(SourceKind::Feed),
            "html" | "page" => Ok(SourceKind::Page),
            other => Err(format!("Unknown source kind: {}", other)),
        }
    }
}

/// One subscribed feed or page, as loaded from the source store.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSource {
    pub name: String,
    pub kind: SourceKind,
    pub url: String,
    /// Plugin file name; only set for [`SourceKind::Page`].
    pub plugin: Option<String>,
    /// Append-only, oldest first.
    pub ledger: Vec<DownloadedItem>,
    pub latest: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl TrackedSource {
    pub fn display_plugin(&self) -> &str {
        self.plugin.as_deref().unwrap_or("-")
    }

    /// The ledger reduced to what a plugin needs to know.
    pub fn seen_items(&self) -> Vec<CandidateItem> {
        self.ledger
            .iter()
            .map(|entry| CandidateItem::new(&entry.title, &entry.url))
            .collect()
    }
}

/// Everything needed to materialize a new [`TrackedSource`].
#[derive(Debug, Clone)]
pub struct NewSource {
    pub name: String,
    pub kind: SourceKind,
    pub url: String,
    pub plugin: Option<String>,
    /// Item to start after; becomes the first ledger entry.
    pub seed: Option<CandidateItem>,
}

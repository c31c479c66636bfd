use feed_rs::model::Entry;
use feed_rs::parser;
use html_escape::decode_html_entities;
use tracing::debug;

use crate::app::{AutomediaError, Result};
use crate::domain::CandidateItem;

#[derive(Debug, Clone)]
pub struct FeedMeta {
    pub title: Option<String>,
}

#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Parse a feed body into candidates, preserving the feed's order
    /// (newest first for every feed we track).
    pub fn normalize(&self, feed_url: &str, body: &[u8]) -> Result<(FeedMeta, Vec<CandidateItem>)> {
        let feed = parser::parse(body).map_err(|e| AutomediaError::FeedParse(e.to_string()))?;

        let meta = FeedMeta {
            title: feed
                .title
                .map(|t| decode_html_entities(&t.content).trim().to_string())
                .filter(|t| !t.is_empty()),
        };

        let items = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let item = Self::candidate(&entry);
                if item.is_none() {
                    debug!(feed = %feed_url, entry = %entry.id, "Skipping entry without title or link");
                }
                item
            })
            .collect();

        Ok((meta, items))
    }

    fn candidate(entry: &Entry) -> Option<CandidateItem> {
        let title = entry
            .title
            .as_ref()
            .map(|t| decode_html_entities(&t.content).trim().to_string())
            .filter(|t| !t.is_empty())?;

        // Torrent feeds put the .torrent either in <link> or in an enclosure
        let url = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .or_else(|| {
                entry
                    .media
                    .iter()
                    .flat_map(|m| m.content.iter())
                    .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
            })?;

        Some(CandidateItem::new(title, url))
    }
}

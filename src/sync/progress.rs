use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::domain::task::FINISHED_MARKER;
use crate::domain::TrackedSource;
use crate::torrent::TorrentEntry;

/// An item that finished between two polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishedItem {
    /// `<source>/<item>`
    Page(String),
    Torrent { id: i64, name: String },
}

impl FinishedItem {
    pub fn display_name(&self) -> &str {
        match self {
            FinishedItem::Page(name) => name,
            FinishedItem::Torrent { name, .. } => name,
        }
    }
}

/// Completion state of everything in flight at one poll.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    /// `<source>/<item>` → finished
    items: HashMap<String, bool>,
    torrents: HashMap<i64, TorrentEntry>,
}

impl ProgressSnapshot {
    pub fn new(items: HashMap<String, bool>, torrents: Vec<TorrentEntry>) -> Self {
        Self {
            items,
            torrents: torrents.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    /// Scan item directories of page sources for `.finished` markers.
    pub fn scan_items(download_dir: &Path, sources: &[TrackedSource]) -> HashMap<String, bool> {
        let mut items = HashMap::new();
        for source in sources {
            let Ok(entries) = fs::read_dir(download_dir.join(&source.name)) else {
                continue;
            };
            for entry in entries.flatten() {
                if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    continue;
                }
                let finished = entry.path().join(FINISHED_MARKER).is_file();
                let key = format!("{}/{}", source.name, entry.file_name().to_string_lossy());
                items.insert(key, finished);
            }
        }
        items
    }

    pub fn torrents(&self) -> Vec<TorrentEntry> {
        self.torrents.values().cloned().collect()
    }

    /// Items unfinished in `previous` and finished now.
    pub fn newly_finished(&self, previous: &ProgressSnapshot) -> Vec<FinishedItem> {
        let mut finished: Vec<FinishedItem> = self
            .items
            .iter()
            .filter(|(key, done)| **done && previous.items.get(*key) == Some(&false))
            .map(|(key, _)| FinishedItem::Page(key.clone()))
            .collect();
        finished.sort_by(|a, b| a.display_name().cmp(b.display_name()));

        let mut torrents: Vec<&TorrentEntry> = self
            .torrents
            .values()
            .filter(|t| t.is_finished())
            .filter(|t| {
                previous
                    .torrents
                    .get(&t.id)
                    .is_some_and(|before| !before.is_finished())
            })
            .collect();
        torrents.sort_by_key(|t| t.id);
        finished.extend(torrents.into_iter().map(|t| FinishedItem::Torrent {
            id: t.id,
            name: t.name.clone(),
        }));

        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceKind;
    use tempfile::TempDir;

    fn torrent(id: i64, name: &str, progress: f64) -> TorrentEntry {
        TorrentEntry {
            id,
            name: name.into(),
            progress,
        }
    }

    fn page_source(name: &str) -> TrackedSource {
        TrackedSource {
            name: name.into(),
            kind: SourceKind::Page,
            url: "https://site/x".into(),
            plugin: Some("site".into()),
            ledger: Vec::new(),
            latest: None,
            updated_at: None,
            synced_at: None,
        }
    }

    #[test]
    fn test_scan_items() {
        let tmp = TempDir::new().unwrap();
        let manga = tmp.path().join("Manga");
        fs::create_dir_all(manga.join("Ch 1")).unwrap();
        fs::create_dir_all(manga.join("Ch 2")).unwrap();
        fs::write(manga.join("Ch 1").join(FINISHED_MARKER), "1").unwrap();

        let items = ProgressSnapshot::scan_items(
            tmp.path(),
            &[page_source("Manga"), page_source("Missing")],
        );
        assert_eq!(items.len(), 2);
        assert_eq!(items.get("Manga/Ch 1"), Some(&true));
        assert_eq!(items.get("Manga/Ch 2"), Some(&false));
    }

    #[test]
    fn test_page_transition() {
        let before = ProgressSnapshot::new(
            HashMap::from([("M/1".to_string(), false), ("M/2".to_string(), false)]),
            vec![],
        );
        let after = ProgressSnapshot::new(
            HashMap::from([
                ("M/1".to_string(), true),
                ("M/2".to_string(), false),
                // Finished before we ever saw it unfinished
                ("M/3".to_string(), true),
            ]),
            vec![],
        );

        assert_eq!(
            after.newly_finished(&before),
            vec![FinishedItem::Page("M/1".into())]
        );
        assert!(after.newly_finished(&after).is_empty());
    }

    #[test]
    fn test_torrents_matched_by_id_not_name() {
        let before = ProgressSnapshot::new(HashMap::new(), vec![torrent(1, "tmp-name", 40.0)]);
        let after = ProgressSnapshot::new(
            HashMap::new(),
            vec![torrent(1, "Show E1", 100.0), torrent(2, "Show E2", 100.0)],
        );

        assert_eq!(
            after.newly_finished(&before),
            vec![FinishedItem::Torrent {
                id: 1,
                name: "Show E1".into()
            }]
        );
    }

    #[test]
    fn test_first_poll_reports_nothing() {
        let after = ProgressSnapshot::new(
            HashMap::from([("M/1".to_string(), true)]),
            vec![torrent(1, "Show E1", 100.0)],
        );
        assert!(after.newly_finished(&ProgressSnapshot::default()).is_empty());
    }
}

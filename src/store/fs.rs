//! Directory-per-source store.
//!
//! ```text
//! <root>/<rss|html>/tracked/<name>/
//!     link        source URL
//!     plugin      plugin file name (html only)
//!     latest      title of the newest requested item
//!     updated     unix time of the last ledger append
//!     synced      unix time of the last sync
//!     data        JSON ledger document
//!     .in_progress  present only while the source is being created
//! ```

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info, warn};

use crate::app::{AutomediaError, Result};
use crate::domain::{
    CandidateItem, DownloadedItem, LedgerDocument, NewSource, SourceKind, TrackedSource,
};
use crate::store::Store;

const LINK_FILE: &str = "link";
const PLUGIN_FILE: &str = "plugin";
const LATEST_FILE: &str = "latest";
const UPDATED_FILE: &str = "updated";
const SYNCED_FILE: &str = "synced";
const DATA_FILE: &str = "data";
const CREATING_MARKER: &str = ".in_progress";

pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tracked_dir(&self, kind: SourceKind) -> PathBuf {
        self.root.join(kind.dir_name()).join("tracked")
    }

    fn source_dir(&self, kind: SourceKind, name: &str) -> PathBuf {
        self.tracked_dir(kind).join(name)
    }

    fn now() -> DateTime<Utc> {
        // Persisted with second precision; keep memory and disk identical.
        Utc::now().trunc_subsecs(0)
    }

    fn load(&self, kind: SourceKind, name: &str, dir: &Path) -> Result<TrackedSource> {
        let url = read_field(&dir.join(LINK_FILE))?
            .ok_or_else(|| AutomediaError::corrupt(name, "link missing"))?;

        let plugin = read_field(&dir.join(PLUGIN_FILE))?;
        if kind == SourceKind::Page && plugin.is_none() {
            return Err(AutomediaError::corrupt(name, "plugin missing"));
        }

        let latest = read_field(&dir.join(LATEST_FILE))?;

        let (ledger, mut updated_at) = match read_raw(&dir.join(DATA_FILE))? {
            Some(raw) => {
                let doc: LedgerDocument = serde_json::from_str(&raw).map_err(|e| {
                    AutomediaError::corrupt(name, format!("invalid data file: {}", e))
                })?;
                if doc.downloaded.iter().any(|entry| entry.title.trim().is_empty()) {
                    return Err(AutomediaError::corrupt(name, "ledger entry without title"));
                }
                (doc.downloaded, Some(doc.updated))
            }
            // Sources written before the ledger existed only know their latest title
            None => {
                let ledger = latest
                    .iter()
                    .map(|title| DownloadedItem {
                        title: title.clone(),
                        url: String::new(),
                        downloaded_at: DateTime::<Utc>::default(),
                    })
                    .collect();
                (ledger, None)
            }
        };

        if let Some(ts) = read_timestamp(&dir.join(UPDATED_FILE))? {
            updated_at = Some(ts);
        }
        let synced_at = read_timestamp(&dir.join(SYNCED_FILE))?;

        Ok(TrackedSource {
            name: name.to_string(),
            kind,
            url,
            plugin,
            ledger,
            latest,
            updated_at,
            synced_at,
        })
    }

    fn write_ledger(
        &self,
        source: &TrackedSource,
        ledger: &[DownloadedItem],
        updated: DateTime<Utc>,
    ) -> Result<()> {
        let doc = LedgerDocument {
            link: source.url.clone(),
            plugin: source.plugin.clone(),
            updated,
            downloaded: ledger.to_vec(),
        };
        let dir = self.source_dir(source.kind, &source.name);
        write_atomic(&dir.join(DATA_FILE), &serde_json::to_vec_pretty(&doc)?)
    }
}

impl Store for FsStore {
    fn list_tracked(&self, kind: SourceKind) -> Result<Vec<TrackedSource>> {
        let tracked_dir = self.tracked_dir(kind);
        let entries = match fs::read_dir(&tracked_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sources = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let dir = entry.path();

            if dir.join(CREATING_MARKER).exists() {
                info!(source = %name, kind = %kind, "Skipping in-progress source");
                continue;
            }
            // `create` has made the directory but not yet its marker
            if matches!(is_empty_dir(&dir), Ok(true)) {
                debug!(source = %name, kind = %kind, "Skipping source being created");
                continue;
            }

            match self.load(kind, &name, &dir) {
                Ok(source) => sources.push(source),
                Err(e) => warn!(source = %name, kind = %kind, "Skipping source: {}", e),
            }
        }

        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }

    fn get_source(&self, kind: SourceKind, name: &str) -> Result<Option<TrackedSource>> {
        let dir = self.source_dir(kind, name);
        if !dir.is_dir() || dir.join(CREATING_MARKER).exists() || is_empty_dir(&dir)? {
            return Ok(None);
        }
        self.load(kind, name, &dir).map(Some)
    }

    fn create(&self, new: &NewSource) -> Result<TrackedSource> {
        if new.name.is_empty() || new.name.contains('/') || new.name.starts_with('.') {
            return Err(AutomediaError::Config(format!(
                "Invalid source name: {:?}",
                new.name
            )));
        }
        if new.kind == SourceKind::Page && new.plugin.is_none() {
            return Err(AutomediaError::PluginNotFound(new.url.clone()));
        }

        let tracked_dir = self.tracked_dir(new.kind);
        fs::create_dir_all(&tracked_dir)?;

        // Non-recursive so that a concurrent add of the same name loses
        let dir = tracked_dir.join(&new.name);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AutomediaError::SourceExists(new.name.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        let now = Self::now();
        let marker = dir.join(CREATING_MARKER);
        fs::write(&marker, now.timestamp().to_string())?;

        let ledger: Vec<DownloadedItem> = new
            .seed
            .iter()
            .map(|item| DownloadedItem::new(item, now))
            .collect();

        let source = TrackedSource {
            name: new.name.clone(),
            kind: new.kind,
            url: new.url.clone(),
            plugin: new.plugin.clone(),
            ledger,
            latest: new.seed.as_ref().map(|item| item.title.clone()),
            updated_at: Some(now),
            synced_at: None,
        };

        write_atomic(&dir.join(LINK_FILE), source.url.as_bytes())?;
        if let Some(plugin) = &source.plugin {
            write_atomic(&dir.join(PLUGIN_FILE), plugin.as_bytes())?;
        }
        if let Some(latest) = &source.latest {
            write_atomic(&dir.join(LATEST_FILE), latest.as_bytes())?;
        }
        write_atomic(&dir.join(UPDATED_FILE), now.timestamp().to_string().as_bytes())?;
        self.write_ledger(&source, &source.ledger, now)?;

        fs::remove_file(&marker)?;
        debug!(source = %source.name, kind = %source.kind, "Created source");

        Ok(source)
    }

    fn append_downloaded(&self, source: &mut TrackedSource, item: &CandidateItem) -> Result<()> {
        let now = Self::now();
        let entry = DownloadedItem::new(item, now);

        let mut ledger = source.ledger.clone();
        ledger.push(entry);
        self.write_ledger(source, &ledger, now)?;

        let dir = self.source_dir(source.kind, &source.name);
        write_atomic(&dir.join(LATEST_FILE), item.title.as_bytes())?;
        write_atomic(&dir.join(UPDATED_FILE), now.timestamp().to_string().as_bytes())?;

        source.ledger = ledger;
        source.latest = Some(item.title.clone());
        source.updated_at = Some(now);
        Ok(())
    }

    fn mark_synced(&self, source: &mut TrackedSource) -> Result<()> {
        let now = Self::now();
        let dir = self.source_dir(source.kind, &source.name);
        write_atomic(&dir.join(SYNCED_FILE), now.timestamp().to_string().as_bytes())?;
        source.synced_at = Some(now);
        Ok(())
    }

    fn all_downloaded(&self) -> Result<Vec<(String, DownloadedItem)>> {
        let mut items = Vec::new();
        for kind in SourceKind::ALL {
            for source in self.list_tracked(kind)? {
                for entry in source.ledger {
                    items.push((source.name.clone(), entry));
                }
            }
        }
        items.sort_by_key(|(_, entry)| entry.downloaded_at);
        Ok(items)
    }
}

/// Write to a sibling temp file and rename over the target.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn read_raw(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Trimmed file content; empty files count as missing.
pub(crate) fn read_field(path: &Path) -> Result<Option<String>> {
    Ok(read_raw(path)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

fn read_timestamp(path: &Path) -> Result<Option<DateTime<Utc>>> {
    Ok(read_field(path)?
        .and_then(|s| s.parse::<f64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs as i64, 0)))
}

fn is_empty_dir(dir: &Path) -> Result<bool> {
    match fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

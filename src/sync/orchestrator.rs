use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::Result;
use crate::dedup;
use crate::domain::task::{FINISHED_MARKER, IN_PROGRESS_MARKER, SESSION_FILE};
use crate::domain::{
    sanitize_name, CandidateItem, DownloadTask, SessionId, SourceKind, TrackedSource,
};
use crate::notify::{Notification, Notifications, Urgency};
use crate::plugin::ContentSource;
use crate::store::fs::{read_field, write_atomic};
use crate::store::Store;

/// What one source's sync did.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Downloads requested this cycle, oldest first.
    pub started: Vec<DownloadTask>,
    /// Orphaned downloads re-issued under the current session.
    pub resumed: usize,
    /// Set when a failed request stopped the remaining items.
    pub halted: Option<String>,
}

/// Requests downloads for new items and keeps the ledger in step.
pub struct Orchestrator {
    store: Arc<dyn Store>,
    notifications: Notifications,
    download_dir: PathBuf,
    session: SessionId,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        notifications: Notifications,
        download_dir: PathBuf,
        session: SessionId,
    ) -> Self {
        Self {
            store,
            notifications,
            download_dir,
            session,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Resume orphans, list, dedup and request every new item of `source`.
    ///
    /// Listing failures are returned; a failed download request is not an
    /// error but halts the newer items until the next cycle.
    pub async fn sync_source(
        &self,
        source: &mut TrackedSource,
        content: &dyn ContentSource,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        if source.kind == SourceKind::Page {
            report.resumed = self.resume_orphans(source, content).await?;
        }

        let candidates: Vec<CandidateItem> = content
            .list(&source.url, &source.seen_items())
            .await?
            .into_iter()
            .filter(|item| {
                let titled = !item.title.trim().is_empty();
                if !titled {
                    warn!(source = %source.name, url = %item.url, "Skipping item without title");
                }
                titled
            })
            .collect();
        let fresh = dedup::new_items(&candidates, &source.ledger);
        if fresh.is_empty() {
            debug!(source = %source.name, "No new items");
            return Ok(report);
        }
        info!(source = %source.name, "{} new items", fresh.len());

        let mut taken: HashSet<String> = source
            .ledger
            .iter()
            .map(|entry| sanitize_name(&entry.title))
            .collect();

        for item in fresh {
            let (item_key, target_dir) = match source.kind {
                SourceKind::Page => {
                    let key = unique_key(&item, &taken);
                    let dir = self.download_dir.join(&source.name).join(&key);
                    (key, Some(dir))
                }
                SourceKind::Feed => (item.item_key(), None),
            };
            taken.insert(item_key.clone());
            let mut task = DownloadTask::new(
                &source.name,
                item_key,
                target_dir,
                self.session.clone(),
            );

            if let Err(e) = self.request(&task, &item, content).await {
                task.abandon();
                warn!(source = %source.name, item = %item.title, "Download request failed: {}", e);
                self.notifications.emit(Notification::failure(
                    "Download failed",
                    format!("Failed to download {}: {}", task.display_name(), e),
                    Urgency::Critical,
                ));
                report.halted = Some(e.to_string());
                break;
            }

            task.mark_in_progress();
            self.store.append_downloaded(source, &item)?;
            self.notifications
                .emit(Notification::started(&task.display_name()));
            report.started.push(task);
        }

        Ok(report)
    }

    async fn request(
        &self,
        task: &DownloadTask,
        item: &CandidateItem,
        content: &dyn ContentSource,
    ) -> Result<()> {
        let handle = match &task.target_dir {
            Some(item_dir) => {
                fs::create_dir_all(item_dir)?;
                write_atomic(&item_dir.join(SESSION_FILE), task.session.as_str().as_bytes())?;
                content.download(&item.url, item_dir).await?
            }
            None => content.download(&item.url, &self.download_dir).await?,
        };
        // Requested, not owned: completion shows up in the progress poll
        handle.detach();
        Ok(())
    }

    /// Re-issue downloads left behind by an earlier run.
    ///
    /// An item is orphaned when it has an `.in_progress` marker, no
    /// `.finished` marker, and a session file from another run.
    pub async fn resume_orphans(
        &self,
        source: &TrackedSource,
        content: &dyn ContentSource,
    ) -> Result<usize> {
        let source_dir = self.download_dir.join(&source.name);
        let entries = match fs::read_dir(&source_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut resumed = 0;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let item_dir = entry.path();
            let item = entry.file_name().to_string_lossy().into_owned();

            if item_dir.join(FINISHED_MARKER).exists() {
                continue;
            }
            let Some(url) = read_field(&item_dir.join(IN_PROGRESS_MARKER))? else {
                continue;
            };
            let recorded = read_field(&item_dir.join(SESSION_FILE))?.map(|s| SessionId::from(s.as_str()));
            if recorded.as_ref() == Some(&self.session) {
                continue;
            }

            match content.download(&url, &item_dir).await {
                Ok(handle) => {
                    handle.detach();
                    write_atomic(&item_dir.join(SESSION_FILE), self.session.as_str().as_bytes())?;
                    info!(source = %source.name, item = %item, "Resumed orphaned download");
                    self.notifications
                        .emit(Notification::resumed(&item, source.display_plugin()));
                    resumed += 1;
                }
                Err(e) => {
                    warn!(source = %source.name, item = %item, "Failed to resume download: {}", e);
                    self.notifications.emit(Notification::failure(
                        "Resume failed",
                        format!("Failed to resume {}/{}: {}", source.name, item, e),
                        Urgency::Critical,
                    ));
                }
            }
        }

        Ok(resumed)
    }
}

/// Directory name for `item` not already used by another item of the source.
///
/// Distinct titles can sanitize to the same name (`A/B` and `A_B`).
fn unique_key(item: &CandidateItem, taken: &HashSet<String>) -> String {
    let key = item.item_key();
    if !taken.contains(&key) {
        return key;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{} ({})", key, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

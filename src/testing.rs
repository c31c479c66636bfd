//! In-memory fakes for the engine's collaborators.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::app::{AutomediaError, PluginFailure, Result};
use crate::domain::{CandidateItem, TrackedSource};
use crate::fetcher::Fetcher;
use crate::notify::{Notification, Notifier};
use crate::plugin::{ContentSource, DownloadHandle, Resolver};
use crate::torrent::{TorrentClient, TorrentEntry};

#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.notifications().into_iter().map(|n| n.title).collect()
    }

    pub fn bodies_titled(&self, title: &str) -> Vec<String> {
        self.notifications()
            .into_iter()
            .filter(|n| n.title == title)
            .map(|n| n.body)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, notification: &Notification) {
        self.delivered.lock().unwrap().push(notification.clone());
    }
}

#[derive(Default)]
pub struct FakeTorrentClient {
    added: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    torrents: Mutex<Vec<TorrentEntry>>,
    list_fails: AtomicBool,
}

impl FakeTorrentClient {
    pub fn added(&self) -> Vec<String> {
        self.added.lock().unwrap().clone()
    }

    pub fn fail_adds_for(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn set_torrents(&self, torrents: Vec<TorrentEntry>) {
        *self.torrents.lock().unwrap() = torrents;
    }

    pub fn set_list_fails(&self, fails: bool) {
        self.list_fails.store(fails, Ordering::SeqCst);
    }
}

#[async_trait]
impl TorrentClient for FakeTorrentClient {
    async fn add_torrent(&self, url: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(url) {
            return Err(AutomediaError::DownloadRequest(url.to_string()));
        }
        self.added.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentEntry>> {
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(AutomediaError::Torrent("connection refused".into()));
        }
        Ok(self.torrents.lock().unwrap().clone())
    }
}

pub struct StaticFetcher {
    body: String,
}

impl StaticFetcher {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
        }
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        Ok(self.body.clone().into_bytes())
    }
}

/// Scripted content source. `None` listing means the plugin exits nonzero.
pub struct FakeSource {
    listing: Mutex<Option<Vec<CandidateItem>>>,
    failing_downloads: Mutex<HashSet<String>>,
    downloads: Mutex<Vec<(String, PathBuf)>>,
    seen_inputs: Mutex<Vec<Vec<CandidateItem>>>,
    write_markers: bool,
}

impl FakeSource {
    /// `items` newest first.
    pub fn new(items: Vec<CandidateItem>) -> Self {
        Self {
            listing: Mutex::new(Some(items)),
            failing_downloads: Mutex::new(HashSet::new()),
            downloads: Mutex::new(Vec::new()),
            seen_inputs: Mutex::new(Vec::new()),
            write_markers: false,
        }
    }

    /// Write `.in_progress` into the target directory like a real plugin.
    pub fn with_markers(mut self) -> Self {
        self.write_markers = true;
        self
    }

    pub fn set_items(&self, items: Vec<CandidateItem>) {
        *self.listing.lock().unwrap() = Some(items);
    }

    pub fn fail_listing(&self) {
        *self.listing.lock().unwrap() = None;
    }

    pub fn fail_download_for(&self, url: &str) {
        self.failing_downloads.lock().unwrap().insert(url.to_string());
    }

    pub fn downloads(&self) -> Vec<(String, PathBuf)> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn downloaded_urls(&self) -> Vec<String> {
        self.downloads().into_iter().map(|(url, _)| url).collect()
    }

    pub fn list_calls(&self) -> usize {
        self.seen_inputs.lock().unwrap().len()
    }

    pub fn last_seen(&self) -> Option<Vec<CandidateItem>> {
        self.seen_inputs.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list(&self, _url: &str, seen: &[CandidateItem]) -> Result<Vec<CandidateItem>> {
        self.seen_inputs.lock().unwrap().push(seen.to_vec());
        match self.listing.lock().unwrap().clone() {
            Some(items) => Ok(items),
            None => Err(PluginFailure::Exit {
                plugin: "fake".into(),
                status: "exit status: 1".into(),
                stdout: String::new(),
                stderr: "boom".into(),
            }
            .into()),
        }
    }

    async fn download(&self, url: &str, target_dir: &Path) -> Result<DownloadHandle> {
        if self.failing_downloads.lock().unwrap().contains(url) {
            return Err(AutomediaError::DownloadRequest(url.to_string()));
        }
        if self.write_markers {
            std::fs::write(target_dir.join(".in_progress"), url)?;
        }
        self.downloads
            .lock()
            .unwrap()
            .push((url.to_string(), target_dir.to_path_buf()));
        Ok(DownloadHandle::accepted())
    }
}

/// Resolves every source to the same fake, except the ones marked broken.
pub struct FakeResolver {
    source: Arc<FakeSource>,
    broken: Mutex<HashSet<String>>,
}

impl FakeResolver {
    pub fn new(source: Arc<FakeSource>) -> Self {
        Self {
            source,
            broken: Mutex::new(HashSet::new()),
        }
    }

    pub fn break_source(&self, name: &str) {
        self.broken.lock().unwrap().insert(name.to_string());
    }
}

impl Resolver for FakeResolver {
    fn resolve(&self, source: &TrackedSource) -> Result<Arc<dyn ContentSource>> {
        if self.broken.lock().unwrap().contains(&source.name) {
            return Err(AutomediaError::PluginNotFound(source.name.clone()));
        }
        Ok(self.source.clone())
    }
}

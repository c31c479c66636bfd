//! The sync daemon: periodic source syncs, progress polls and the
//! single-instance lock guarding a download directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::{AutomediaError, Result};
use crate::config::{format_interval, parse_interval, SyncConfig};
use crate::domain::{SessionId, SourceKind, TrackedSource};
use crate::notify::{Notification, Notifications, Urgency};
use crate::plugin::Resolver;
use crate::store::Store;
use crate::sync::{FinishedItem, Orchestrator, ProgressSnapshot};
use crate::torrent::TorrentClient;

/// Lock file name inside the download directory.
pub const LOCK_FILE: &str = ".automedia.lock";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub download_dir: PathBuf,
    /// Outer period: sync every tracked source
    pub sync_interval: Duration,
    /// Inner period: poll in-flight downloads
    pub poll_interval: Duration,
}

impl DaemonConfig {
    pub fn new(download_dir: PathBuf, sync: &SyncConfig) -> Result<Self> {
        let sync_secs = parse_interval(&sync.sync_interval).map_err(AutomediaError::Config)?;
        let poll_secs = parse_interval(&sync.poll_interval).map_err(AutomediaError::Config)?;
        if poll_secs == 0 {
            return Err(AutomediaError::Config("poll_interval must be positive".into()));
        }
        Ok(Self {
            download_dir,
            sync_interval: Duration::from_secs(sync_secs),
            poll_interval: Duration::from_secs(poll_secs),
        })
    }

    /// Number of polls per sync, at least one.
    pub fn polls_per_sync(&self) -> u32 {
        let polls = self.sync_interval.as_secs() / self.poll_interval.as_secs().max(1);
        polls.clamp(1, u32::MAX as u64) as u32
    }
}

/// Outcome of one outer tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub synced: usize,
    pub failed: usize,
    pub started: usize,
}

/// Daemon runner
pub struct Daemon {
    store: Arc<dyn Store>,
    resolver: Arc<dyn Resolver>,
    torrent: Arc<dyn TorrentClient>,
    notifications: Notifications,
    orchestrator: Orchestrator,
    config: DaemonConfig,
    cancel: CancellationToken,
    previous: ProgressSnapshot,
    page_sources: Vec<TrackedSource>,
}

impl Daemon {
    pub fn new(
        store: Arc<dyn Store>,
        resolver: Arc<dyn Resolver>,
        torrent: Arc<dyn TorrentClient>,
        notifications: Notifications,
        config: DaemonConfig,
    ) -> Self {
        let orchestrator = Orchestrator::new(
            store.clone(),
            notifications.clone(),
            config.download_dir.clone(),
            SessionId::generate(),
        );
        Self {
            store,
            resolver,
            torrent,
            notifications,
            orchestrator,
            config,
            cancel: CancellationToken::new(),
            previous: ProgressSnapshot::default(),
            page_sources: Vec::new(),
        }
    }

    pub fn session(&self) -> &SessionId {
        self.orchestrator.session()
    }

    /// Token that stops the loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn spawn_signal_handler(&self) {
        let cancel = self.cancel.clone();

        #[cfg(unix)]
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!("Failed to install signal handlers: {}", e);
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
            cancel.cancel();
        });

        #[cfg(windows)]
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            cancel.cancel();
        });
    }

    /// Run until a stop signal arrives.
    ///
    /// Fails with [`AutomediaError::InstanceConflict`] when another daemon
    /// holds the download directory.
    pub async fn run(&mut self) -> Result<()> {
        fs::create_dir_all(&self.config.download_dir)?;
        let _lock = InstanceLock::acquire(&self.config.download_dir)?;
        self.spawn_signal_handler();

        if let Err(e) = self.torrent.ensure_running(&self.config.download_dir).await {
            warn!("Torrent service unavailable: {}", e);
        }

        info!(
            session = %self.session(),
            download_dir = %self.config.download_dir.display(),
            "Automedia daemon started (sync interval: {}, poll interval: {}, PID: {})",
            format_interval(self.config.sync_interval.as_secs()),
            format_interval(self.config.poll_interval.as_secs()),
            std::process::id()
        );

        let polls = self.config.polls_per_sync();
        'outer: loop {
            let summary = self.sync_all().await;
            info!(
                "Sync complete: {} sources synced, {} failed, {} downloads started",
                summary.synced, summary.failed, summary.started
            );

            for _ in 0..polls {
                self.poll_progress().await;
                tokio::select! {
                    _ = self.cancel.cancelled() => break 'outer,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }

        info!("Daemon shutting down...");
        Ok(())
    }

    /// Sync every tracked source, one at a time.
    ///
    /// A failing source is reported and skipped; it never stops the others.
    pub async fn sync_all(&mut self) -> CycleSummary {
        let mut summary = CycleSummary::default();
        let mut page_sources = Vec::new();

        for kind in SourceKind::ALL {
            let sources = match self.store.list_tracked(kind) {
                Ok(sources) => sources,
                Err(e) => {
                    warn!(kind = %kind, "Failed to list tracked sources: {}", e);
                    continue;
                }
            };

            for mut source in sources {
                if self.cancel.is_cancelled() {
                    break;
                }
                match self.sync_source(&mut source).await {
                    Ok(started) => {
                        summary.synced += 1;
                        summary.started += started;
                        if let Err(e) = self.store.mark_synced(&mut source) {
                            warn!(source = %source.name, "Failed to record sync time: {}", e);
                        }
                    }
                    Err(e) => {
                        summary.failed += 1;
                        self.report_failure(&source, &e);
                    }
                }
                if kind == SourceKind::Page {
                    page_sources.push(source);
                }
            }
        }

        self.page_sources = page_sources;
        summary
    }

    async fn sync_source(&self, source: &mut TrackedSource) -> Result<usize> {
        debug!(source = %source.name, kind = %source.kind, "Syncing");
        let content = self.resolver.resolve(source)?;
        let report = self.orchestrator.sync_source(source, content.as_ref()).await?;
        if let Some(reason) = &report.halted {
            info!(source = %source.name, "Halted until next sync: {}", reason);
        }
        Ok(report.started.len())
    }

    fn report_failure(&self, source: &TrackedSource, error: &AutomediaError) {
        warn!(source = %source.name, kind = %source.kind, "Sync failed: {}", error);
        let notification = match error {
            // Network noise, retried next cycle
            AutomediaError::Http(_) => return,
            AutomediaError::Plugin(_) | AutomediaError::PluginNotFound(_) => Notification::failure(
                "Plugin failed",
                format!("{} ({}): {}", source.name, source.display_plugin(), error),
                Urgency::Critical,
            ),
            AutomediaError::FeedParse(_) => Notification::failure(
                "RSS sync failed",
                format!("{}: {}", source.name, error),
                Urgency::Normal,
            ),
            _ => Notification::failure(
                "Sync failed",
                format!("{}: {}", source.name, error),
                Urgency::Normal,
            ),
        };
        self.notifications.emit(notification);
    }

    /// Diff the current progress against the previous poll and notify
    /// every item that finished in between.
    pub async fn poll_progress(&mut self) -> Vec<FinishedItem> {
        let items = ProgressSnapshot::scan_items(&self.config.download_dir, &self.page_sources);
        let torrents = match self.torrent.list_torrents().await {
            Ok(torrents) => torrents,
            Err(e) => {
                debug!("Failed to list torrents: {}", e);
                self.previous.torrents()
            }
        };

        let current = ProgressSnapshot::new(items, torrents);
        let finished = current.newly_finished(&self.previous);
        for item in &finished {
            info!(item = item.display_name(), "Download finished");
            self.notifications
                .emit(Notification::finished(item.display_name()));
        }
        self.previous = current;
        finished
    }
}

/// Holds `<download_dir>/.automedia.lock` for the life of the daemon.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    pub fn path_in(download_dir: &Path) -> PathBuf {
        download_dir.join(LOCK_FILE)
    }

    /// Take the lock, removing it first if its process is gone.
    ///
    /// The PID is written to a staging file and hard-linked into place, so
    /// a lock file is never visible without its PID.
    pub fn acquire(download_dir: &Path) -> Result<Self> {
        let path = Self::path_in(download_dir);
        let staging = download_dir.join(format!("{}.{}", LOCK_FILE, std::process::id()));
        fs::write(&staging, format!("{}\n", std::process::id())).map_err(|source| {
            AutomediaError::Lock {
                path: staging.clone(),
                source,
            }
        })?;

        let linked = Self::link_into_place(&staging, &path);
        let _ = fs::remove_file(&staging);
        linked.map(|()| Self { path })
    }

    fn link_into_place(staging: &Path, path: &Path) -> Result<()> {
        // Second attempt only after removing a stale lock
        for _ in 0..2 {
            match fs::hard_link(staging, path) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let holder = read_pid(path);
                    if let Some(pid) = holder {
                        if process_exists(pid) {
                            return Err(AutomediaError::InstanceConflict { pid });
                        }
                    }
                    warn!(path = %path.display(), "Removing stale lock file");
                    remove_stale(path, holder)?;
                }
                Err(e) => return Err(lock_error(path, e)),
            }
        }

        Err(lock_error(
            path,
            std::io::Error::new(
                ErrorKind::AlreadyExists,
                "lock file was recreated by another process",
            ),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn lock_error(path: &Path, source: std::io::Error) -> AutomediaError {
    AutomediaError::Lock {
        path: path.to_path_buf(),
        source,
    }
}

/// Remove a lock last seen holding `observed`.
///
/// The file is parked under a private name first; if another daemon
/// replaced it in the meantime, its lock is put back.
fn remove_stale(path: &Path, observed: Option<u32>) -> Result<()> {
    let parked = path.with_file_name(format!("{}.stale.{}", LOCK_FILE, std::process::id()));
    match fs::rename(path, &parked) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(lock_error(path, e)),
    }

    let parked_pid = read_pid(&parked);
    if parked_pid != observed {
        if let Some(pid) = parked_pid.filter(|pid| process_exists(*pid)) {
            let restored = fs::hard_link(&parked, path);
            let _ = fs::remove_file(&parked);
            return match restored {
                Err(e) if e.kind() != ErrorKind::AlreadyExists => Err(lock_error(path, e)),
                _ => Err(AutomediaError::InstanceConflict { pid }),
            };
        }
    }

    fs::remove_file(&parked).map_err(|e| lock_error(path, e))
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(target_os = "linux")]
fn process_exists(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(windows)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid)])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Stop the daemon syncing `download_dir` by signalling the recorded PID.
pub fn stop_daemon(download_dir: &Path) -> std::result::Result<u32, String> {
    let lock_path = InstanceLock::path_in(download_dir);

    if !lock_path.exists() {
        return Err(format!(
            "No sync is running in {} (lock file not found)",
            download_dir.display()
        ));
    }

    let pid = read_pid(&lock_path).ok_or_else(|| "Invalid PID in lock file".to_string())?;
    if !process_exists(pid) {
        let _ = fs::remove_file(&lock_path);
        return Err(format!("Sync is not running (removed stale lock for PID {})", pid));
    }

    #[cfg(unix)]
    {
        use std::process::Command;
        let status = Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .status()
            .map_err(|e| format!("Failed to send signal: {}", e))?;

        // The daemon removes its own lock on the way out
        if status.success() {
            Ok(pid)
        } else {
            Err(format!("Failed to stop sync (PID {})", pid))
        }
    }

    #[cfg(windows)]
    {
        use std::process::Command;
        let status = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .status()
            .map_err(|e| format!("Failed to stop process: {}", e))?;

        if status.success() {
            let _ = fs::remove_file(&lock_path);
            Ok(pid)
        } else {
            Err(format!("Failed to stop sync (PID {})", pid))
        }
    }
}

/// Check whether a daemon holds `download_dir`.
pub fn daemon_status(download_dir: &Path) -> String {
    let lock_path = InstanceLock::path_in(download_dir);
    if lock_path.exists() {
        if let Some(pid) = read_pid(&lock_path) {
            if process_exists(pid) {
                return format!("Sync is running (PID: {})", pid);
            } else {
                return "Sync is not running (stale lock file)".to_string();
            }
        }
    }
    "Sync is not running".to_string()
}

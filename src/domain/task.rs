use std::fmt;
use std::path::PathBuf;

/// Written by the plugin when it starts; contains the URL being fetched.
pub const IN_PROGRESS_MARKER: &str = ".in_progress";
/// Written by the plugin once the item is complete.
pub const FINISHED_MARKER: &str = ".finished";
/// Token of the daemon run that last launched the item's download.
pub const SESSION_FILE: &str = ".session_id";

/// Opaque token identifying one daemon run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Requested,
    InProgress,
    Finished,
    Abandoned,
}

/// One download of a single item belonging to a tracked source.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub source: String,
    pub item_key: String,
    /// `None` for torrents, whose location is chosen by the torrent service.
    pub target_dir: Option<PathBuf>,
    pub session: SessionId,
    state: DownloadState,
}

impl DownloadTask {
    pub fn new(
        source: &str,
        item_key: String,
        target_dir: Option<PathBuf>,
        session: SessionId,
    ) -> Self {
        Self {
            source: source.to_string(),
            item_key,
            target_dir,
            session,
            state: DownloadState::Requested,
        }
    }

    pub fn state(&self) -> DownloadState {
        self.state
    }

    pub fn mark_in_progress(&mut self) {
        if matches!(self.state, DownloadState::Requested | DownloadState::InProgress) {
            self.state = DownloadState::InProgress;
        }
    }

    pub fn mark_finished(&mut self) {
        if self.state == DownloadState::InProgress {
            self.state = DownloadState::Finished;
        }
    }

    pub fn abandon(&mut self) {
        if self.state != DownloadState::Finished {
            self.state = DownloadState::Abandoned;
        }
    }

    pub fn display_name(&self) -> String {
        format!("{}/{}", self.source, self.item_key)
    }
}

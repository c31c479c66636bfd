use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::app::{PluginFailure, Result};
use crate::domain::CandidateItem;
use crate::plugin::{ContentSource, DownloadHandle};

/// Output of `<plugin> list`; older plugins wrap the array in `items`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListOutput {
    Items(Vec<CandidateItem>),
    Wrapped { items: Vec<CandidateItem> },
}

impl ListOutput {
    fn into_items(self) -> Vec<CandidateItem> {
        match self {
            ListOutput::Items(items) | ListOutput::Wrapped { items } => items,
        }
    }
}

/// An external program speaking the `list` / `download` protocol.
pub struct PluginSource {
    path: PathBuf,
    name: String,
    list_timeout: Option<Duration>,
}

impl PluginSource {
    pub fn new(path: PathBuf, list_timeout: Option<Duration>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            list_timeout,
        }
    }

    fn launch_failure(&self, source: std::io::Error) -> PluginFailure {
        PluginFailure::Launch {
            plugin: self.name.clone(),
            source,
        }
    }
}

#[async_trait]
impl ContentSource for PluginSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, url: &str, seen: &[CandidateItem]) -> Result<Vec<CandidateItem>> {
        let input = serde_json::to_vec(seen)?;

        let mut child = Command::new(&self.path)
            .arg("list")
            .arg(url)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.launch_failure(e))?;

        // Feed stdin concurrently so a chatty plugin cannot deadlock on a full pipe
        if let Some(mut stdin) = child.stdin.take() {
            let plugin = self.name.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        warn!(plugin = %plugin, "Failed to write seen items: {}", e);
                    }
                }
            });
        }

        let output = match self.list_timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| PluginFailure::TimedOut {
                    plugin: self.name.clone(),
                    secs: limit.as_secs(),
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| self.launch_failure(e))?;

        if !output.status.success() {
            return Err(PluginFailure::Exit {
                plugin: self.name.clone(),
                status: output.status.to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        let parsed: ListOutput =
            serde_json::from_slice(&output.stdout).map_err(|e| PluginFailure::BadOutput {
                plugin: self.name.clone(),
                reason: e.to_string(),
            })?;

        let items: Vec<CandidateItem> = parsed
            .into_items()
            .into_iter()
            .filter(|item| {
                let titled = !item.title.trim().is_empty();
                if !titled {
                    warn!(plugin = %self.name, url = %item.url, "Skipping item without name");
                }
                titled
            })
            .collect();
        debug!(plugin = %self.name, url = %url, "Plugin listed {} items", items.len());
        Ok(items)
    }

    async fn download(&self, url: &str, target_dir: &Path) -> Result<DownloadHandle> {
        let mut child = Command::new(&self.path)
            .arg("download")
            .arg(url)
            .arg(target_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| self.launch_failure(e))?;

        let plugin = self.name.clone();
        let url = url.to_string();
        let exit = tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    debug!(plugin = %plugin, url = %url, "Plugin download finished");
                    true
                }
                Ok(status) => {
                    warn!(plugin = %plugin, url = %url, "Plugin download exited with {}", status);
                    false
                }
                Err(e) => {
                    warn!(plugin = %plugin, url = %url, "Failed to wait for plugin download: {}", e);
                    false
                }
            }
        });

        Ok(DownloadHandle::spawned(exit))
    }
}

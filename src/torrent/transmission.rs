//! Transmission JSON-RPC client.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::app::{AutomediaError, Result};
use crate::torrent::{TorrentClient, TorrentConfig, TorrentEntry};

const SESSION_HEADER: &str = "X-Transmission-Session-Id";
const STARTUP_ATTEMPTS: usize = 100;
const STARTUP_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct RpcTorrent {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(rename = "percentDone", default)]
    percent_done: f64,
}

#[derive(Debug, Deserialize)]
struct TorrentList {
    #[serde(default)]
    torrents: Vec<RpcTorrent>,
}

pub struct TransmissionClient {
    client: Client,
    config: TorrentConfig,
    session_id: Mutex<Option<String>>,
}

impl TransmissionClient {
    pub fn new(config: TorrentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            session_id: Mutex::new(None),
        })
    }

    fn current_session(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|s| s.clone())
    }

    fn remember_session(&self, value: Option<&HeaderValue>) {
        let value = value.and_then(|v| v.to_str().ok()).map(String::from);
        if let Ok(mut session) = self.session_id.lock() {
            *session = value;
        }
    }

    /// Issue one RPC call, redoing it once if the server hands out a new
    /// session id.
    async fn call(&self, method: &str, arguments: Value) -> Result<Value> {
        let body = serde_json::to_vec(&json!({ "method": method, "arguments": arguments }))?;

        for _ in 0..2 {
            let mut request = self
                .client
                .post(&self.config.rpc_url)
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
            if let Some(session) = self.current_session() {
                request = request.header(SESSION_HEADER, session);
            }

            let response = request.send().await?;
            if response.status() == StatusCode::CONFLICT {
                debug!("Transmission asked for a new session id");
                self.remember_session(response.headers().get(SESSION_HEADER));
                continue;
            }
            response.error_for_status_ref()?;

            let reply: RpcResponse = serde_json::from_slice(&response.bytes().await?)?;
            if reply.result != "success" {
                return Err(AutomediaError::Torrent(format!("{}: {}", method, reply.result)));
            }
            return Ok(reply.arguments);
        }

        Err(AutomediaError::Torrent(format!(
            "{}: session id handshake failed",
            method
        )))
    }

    pub async fn ping(&self) -> Result<()> {
        self.call("session-get", json!({})).await.map(|_| ())
    }
}

#[async_trait]
impl TorrentClient for TransmissionClient {
    async fn add_torrent(&self, url: &str) -> Result<()> {
        self.call("torrent-add", json!({ "filename": url }))
            .await
            .map_err(|e| AutomediaError::DownloadRequest(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentEntry>> {
        let arguments = self
            .call(
                "torrent-get",
                json!({ "fields": ["id", "name", "percentDone"] }),
            )
            .await?;
        let list: TorrentList = serde_json::from_value(arguments)?;

        Ok(list
            .torrents
            .into_iter()
            .map(|t| TorrentEntry {
                id: t.id,
                name: t.name,
                progress: t.percent_done * 100.0,
            })
            .collect())
    }

    async fn ensure_running(&self, download_dir: &Path) -> Result<()> {
        if self.ping().await.is_ok() {
            return Ok(());
        }
        if !self.config.autostart {
            return Err(AutomediaError::Torrent(format!(
                "{} is unreachable and autostart is disabled",
                self.config.rpc_url
            )));
        }

        info!(download_dir = %download_dir.display(), "Starting transmission-daemon");
        let status = Command::new("transmission-daemon")
            .arg("--global-seedratio")
            .arg(self.config.seed_ratio.to_string())
            .arg("--download-dir")
            .arg(download_dir)
            .status()
            .await
            .map_err(|e| AutomediaError::Torrent(format!("Failed to launch transmission-daemon: {}", e)))?;
        if !status.success() {
            return Err(AutomediaError::Torrent(format!(
                "transmission-daemon exited with {}",
                status
            )));
        }

        for _ in 0..STARTUP_ATTEMPTS {
            if self.ping().await.is_ok() {
                info!("Started torrent daemon with download directory {}", download_dir.display());
                return Ok(());
            }
            tokio::time::sleep(STARTUP_POLL).await;
        }

        warn!("transmission-daemon did not become reachable");
        Err(AutomediaError::Torrent(
            "transmission-daemon did not become reachable".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> TransmissionClient {
        TransmissionClient::new(TorrentConfig {
            rpc_url: format!("{}/transmission/rpc", server.uri()),
            autostart: false,
            ..Default::default()
        })
        .unwrap()
    }

    async fn mount_handshake(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/transmission/rpc"))
            .respond_with(ResponseTemplate::new(409).insert_header(SESSION_HEADER, "abc123"))
            .with_priority(10)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_list_torrents_after_session_handshake() {
        let server = MockServer::start().await;
        mount_handshake(&server).await;
        Mock::given(method("POST"))
            .and(path("/transmission/rpc"))
            .and(header(SESSION_HEADER, "abc123"))
            .and(body_partial_json(json!({ "method": "torrent-get" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "success",
                "arguments": { "torrents": [
                    { "id": 1, "name": "Show E1", "percentDone": 1.0 },
                    { "id": 2, "name": "Show E2", "percentDone": 0.25 }
                ]}
            })))
            .with_priority(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let torrents = client.list_torrents().await.unwrap();

        assert_eq!(torrents.len(), 2);
        assert!(torrents[0].is_finished());
        assert_eq!(torrents[1].id, 2);
        assert!((torrents[1].progress - 25.0).abs() < f64::EPSILON);
        assert_eq!(client.current_session().as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_add_torrent_failure_result() {
        let server = MockServer::start().await;
        mount_handshake(&server).await;
        Mock::given(method("POST"))
            .and(path("/transmission/rpc"))
            .and(header(SESSION_HEADER, "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "invalid or corrupt torrent file",
                "arguments": {}
            })))
            .with_priority(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.add_torrent("https://example.com/bad.torrent").await.unwrap_err();
        assert!(matches!(err, AutomediaError::DownloadRequest(_)));
    }

    #[tokio::test]
    async fn test_add_torrent_success() {
        let server = MockServer::start().await;
        mount_handshake(&server).await;
        Mock::given(method("POST"))
            .and(path("/transmission/rpc"))
            .and(header(SESSION_HEADER, "abc123"))
            .and(body_partial_json(json!({
                "method": "torrent-add",
                "arguments": { "filename": "magnet:?xt=urn:btih:abc" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "success",
                "arguments": { "torrent-added": { "id": 7, "name": "x" } }
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.add_torrent("magnet:?xt=urn:btih:abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_without_autostart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.ensure_running(Path::new("/tmp")).await.unwrap_err();
        assert!(matches!(err, AutomediaError::Torrent(_)));
    }
}

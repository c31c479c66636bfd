//! User-facing notifications.
//!
//! Every notification is logged; delivery to the desktop is filtered by
//! [`NotificationConfig`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Normal,
    Critical,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Started,
    Resumed,
    Finished,
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub urgency: Urgency,
}

impl Notification {
    pub fn started(item: &str) -> Self {
        Self {
            kind: NotificationKind::Started,
            title: "Download started".into(),
            body: item.into(),
            urgency: Urgency::Normal,
        }
    }

    pub fn resumed(item: &str, plugin: &str) -> Self {
        Self {
            kind: NotificationKind::Resumed,
            title: "Resuming".into(),
            body: format!("Resuming download for item {} with plugin {}", item, plugin),
            urgency: Urgency::Normal,
        }
    }

    pub fn finished(item: &str) -> Self {
        Self {
            kind: NotificationKind::Finished,
            title: "Download finished".into(),
            body: item.into(),
            urgency: Urgency::Normal,
        }
    }

    pub fn failure(title: &str, body: impl Into<String>, urgency: Urgency) -> Self {
        Self {
            kind: NotificationKind::Failure,
            title: title.into(),
            body: body.into(),
            urgency,
        }
    }
}

/// A delivery channel for notifications.
pub trait Notifier: Send + Sync {
    fn deliver(&self, notification: &Notification);
}

/// Shows notifications through `notify-send`, without waiting for it.
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn deliver(&self, notification: &Notification) {
        let spawned = Command::new("notify-send")
            .arg("-u")
            .arg(notification.urgency.as_str())
            .arg("--")
            .arg(&notification.title)
            .arg(&notification.body)
            .spawn();
        if let Err(e) = spawned {
            warn!("Failed to launch notify-send: {}", e);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Everything, including failures and download starts
    All,
    /// Only "Download finished"
    Finished,
}

/// `[notifications]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Deliver notifications to the desktop (default: true)
    pub enabled: bool,

    /// Which notifications to deliver (default: all)
    pub level: NotificationLevel,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: NotificationLevel::All,
        }
    }
}

impl NotificationConfig {
    pub fn allows(&self, notification: &Notification) -> bool {
        self.enabled
            && match self.level {
                NotificationLevel::All => true,
                NotificationLevel::Finished => notification.kind == NotificationKind::Finished,
            }
    }
}

/// Logs every notification and forwards the allowed ones.
#[derive(Clone)]
pub struct Notifications {
    notifier: Arc<dyn Notifier>,
    config: NotificationConfig,
}

impl Notifications {
    pub fn new(notifier: Arc<dyn Notifier>, config: NotificationConfig) -> Self {
        Self { notifier, config }
    }

    pub fn desktop(config: NotificationConfig) -> Self {
        Self::new(Arc::new(DesktopNotifier), config)
    }

    pub fn emit(&self, notification: Notification) {
        info!(
            urgency = notification.urgency.as_str(),
            "{}: {}", notification.title, notification.body
        );
        if self.config.allows(&notification) {
            self.notifier.deliver(&notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingNotifier;

    #[test]
    fn test_finished_level_filters_everything_else() {
        let recorder = Arc::new(RecordingNotifier::default());
        let notifications = Notifications::new(
            recorder.clone(),
            NotificationConfig {
                enabled: true,
                level: NotificationLevel::Finished,
            },
        );

        notifications.emit(Notification::started("Show/E1"));
        notifications.emit(Notification::failure("Plugin failed", "boom", Urgency::Critical));
        notifications.emit(Notification::finished("Show/E1"));

        let delivered = recorder.titles();
        assert_eq!(delivered, vec!["Download finished"]);
    }

    #[test]
    fn test_disabled_delivers_nothing() {
        let recorder = Arc::new(RecordingNotifier::default());
        let notifications = Notifications::new(
            recorder.clone(),
            NotificationConfig {
                enabled: false,
                level: NotificationLevel::All,
            },
        );
        notifications.emit(Notification::finished("Show/E1"));
        assert!(recorder.titles().is_empty());
    }

    #[test]
    fn test_level_deserializes_lowercase() {
        let config: NotificationConfig = toml::from_str("level = \"finished\"").unwrap();
        assert_eq!(config.level, NotificationLevel::Finished);
        assert!(config.enabled);
    }
}

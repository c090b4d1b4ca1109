//! # Push Notifications
//!
//! Push payloads are surfaced as user-visible notifications. Nothing here
//! touches the caches.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::config::NotificationConfig;
use crate::error::NotifyError;

/// A notification as handed to the display call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
}

impl Notification {
    /// Build the notification for a push payload.
    ///
    /// A missing or non-UTF-8 payload yields an empty body.
    pub fn from_payload(config: &NotificationConfig, payload: Option<&[u8]>) -> Self {
        let body = payload
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .unwrap_or_default()
            .to_owned();

        Self {
            title: config.title.clone(),
            body,
            icon: config.icon.clone(),
            badge: config.badge.clone(),
        }
    }
}

/// Displays notifications to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            title = %notification.title,
            body = %notification.body,
            icon = ?notification.icon,
            "Notification"
        );
        Ok(())
    }
}

/// Keeps every notification it was asked to show.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.shown.lock().push(notification.clone());
        Ok(())
    }
}

//! User-facing notification seam.
//!
//! Toasts and banners live outside this workspace. Everything that wants to
//! tell the user something goes through [`Notifier::notify`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Visual kind of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Neutral information.
    Info,
    /// Something completed successfully.
    Success,
    /// Degraded but working.
    Warning,
    /// An operation failed.
    Error,
}

impl NotificationKind {
    /// Returns the lowercase name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }
}

/// Sink for user-facing notifications.
///
/// Implementations must not block: notifications are emitted from request
/// and lifecycle paths.
pub trait Notifier: Send + Sync {
    /// Shows `message` as a `kind` notification for `duration`.
    fn notify(&self, message: &str, kind: NotificationKind, duration: Duration);
}

impl<T> Notifier for Arc<T>
where
    T: Notifier + ?Sized,
{
    fn notify(&self, message: &str, kind: NotificationKind, duration: Duration) {
        (**self).notify(message, kind, duration)
    }
}

impl<T> Notifier for Box<T>
where
    T: Notifier + ?Sized,
{
    fn notify(&self, message: &str, kind: NotificationKind, duration: Duration) {
        (**self).notify(message, kind, duration)
    }
}

/// Notifier that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _message: &str, _kind: NotificationKind, _duration: Duration) {}
}

/// Notifier that writes notifications to the `tracing` pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, kind: NotificationKind, duration: Duration) {
        let duration_ms = duration.as_millis() as u64;
        match kind {
            NotificationKind::Error => {
                tracing::error!(kind = kind.as_str(), duration_ms, "{message}")
            }
            NotificationKind::Warning => {
                tracing::warn!(kind = kind.as_str(), duration_ms, "{message}")
            }
            _ => tracing::info!(kind = kind.as_str(), duration_ms, "{message}"),
        }
    }
}

/// A notification captured by [`RecordingNotifier`].
#[cfg(feature = "test-helpers")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Message text.
    pub message: String,
    /// Notification kind.
    pub kind: NotificationKind,
    /// Display duration.
    pub duration: Duration,
}

/// Notifier that records every notification, for assertions in tests.
#[cfg(feature = "test-helpers")]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: std::sync::Mutex<Vec<Notification>>,
}

#[cfg(feature = "test-helpers")]
impl RecordingNotifier {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every notification recorded so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    /// Returns the recorded notifications of `kind`.
    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.lock().iter().filter(|n| n.kind == kind).cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        self.notifications
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(feature = "test-helpers")]
impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, kind: NotificationKind, duration: Duration) {
        self.lock().push(Notification {
            message: message.to_owned(),
            kind,
            duration,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&NotificationKind::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}

//! Per-category error handlers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use http::StatusCode;
use satchel_core::{NotificationKind, Notifier};
use tracing::warn;

use crate::{ErrorCategory, RequestError};

/// Callback invoked with a failed request's error.
pub type ErrorHandler = Arc<dyn Fn(&RequestError) + Send + Sync>;

const NOTIFICATION_DURATION: Duration = Duration::from_secs(5);

/// Handler registry, one handler per [`ErrorCategory`].
///
/// Handlers are a side channel for user feedback. They never decide whether a
/// failure reaches the caller.
#[derive(Default)]
pub(crate) struct ErrorHandlers {
    handlers: DashMap<ErrorCategory, ErrorHandler>,
}

impl ErrorHandlers {
    pub(crate) fn insert(&self, category: ErrorCategory, handler: ErrorHandler) {
        self.handlers.insert(category, handler);
    }

    /// Runs the handler registered for the error's category.
    ///
    /// Returns `false` if no handler is registered, after logging the error.
    pub(crate) fn dispatch(&self, error: &RequestError) -> bool {
        let category = error.category();
        // Clone out so the handler runs without holding a shard lock.
        let handler = self.handlers.get(&category).map(|entry| entry.value().clone());
        match handler {
            Some(handler) => {
                handler(error);
                true
            }
            None => {
                warn!(%category, %error, "Unhandled request error");
                false
            }
        }
    }
}

impl fmt::Debug for ErrorHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let categories: Vec<_> = self.handlers.iter().map(|entry| *entry.key()).collect();
        f.debug_struct("ErrorHandlers")
            .field("categories", &categories)
            .finish()
    }
}

/// Builds the default user-facing handler for `category`.
pub(crate) fn notifying_handler<N>(category: ErrorCategory, notifier: Arc<N>) -> ErrorHandler
where
    N: Notifier + ?Sized + 'static,
{
    Arc::new(move |error: &RequestError| {
        let (message, kind) = user_message(category, error);
        notifier.notify(&message, kind, NOTIFICATION_DURATION);
    })
}

/// Message and severity shown to the user for a failed request.
pub fn user_message(category: ErrorCategory, error: &RequestError) -> (String, NotificationKind) {
    match category {
        ErrorCategory::Timeout => (
            "The request timed out. Please check your connection and try again.".to_owned(),
            NotificationKind::Warning,
        ),
        ErrorCategory::ClientError => {
            let message = match error.status() {
                Some(StatusCode::BAD_REQUEST) => {
                    "Invalid request. Please check your input.".to_owned()
                }
                Some(StatusCode::UNAUTHORIZED) => {
                    "Your session has expired. Please sign in again.".to_owned()
                }
                Some(StatusCode::FORBIDDEN) => {
                    "You do not have permission to do that.".to_owned()
                }
                Some(StatusCode::NOT_FOUND) => "The requested content was not found.".to_owned(),
                Some(status) => format!("The request failed (HTTP {}).", status.as_u16()),
                None => "The request failed.".to_owned(),
            };
            (message, NotificationKind::Warning)
        }
        ErrorCategory::ServerError => (
            "The server is having trouble. Please try again later.".to_owned(),
            NotificationKind::Error,
        ),
        ErrorCategory::NetworkError => (
            "Network error. Please check your internet connection.".to_owned(),
            NotificationKind::Error,
        ),
        ErrorCategory::UnknownError => (
            "Something went wrong. Please try again.".to_owned(),
            NotificationKind::Error,
        ),
    }
}

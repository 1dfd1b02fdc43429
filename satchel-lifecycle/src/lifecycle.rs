use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response};
use satchel_core::{NotificationKind, Notifier};
use satchel_worker::{
    BoxError, CacheWorker, ControlMessage, ControlReply, RegistrationOutcome, WorkerHost,
};
use tokio::sync::watch;
use tower::Service;
use tracing::{debug, info};

use crate::{CacheStats, LifecycleError, Status, format_size};

const OFFLINE_READY: &str = "App ready for offline use";
const UPDATE_AVAILABLE: &str = "A new version is available. Reload to update.";
const CONNECTION_RESTORED: &str = "Connection restored";
const CONNECTION_LOST: &str = "You are offline. Some features may be limited.";
const CACHE_CLEARED: &str = "Offline cache cleared";

/// Callback reloading the page after a new worker took control.
pub type ReloadHook = Arc<dyn Fn() + Send + Sync>;

/// Page-side glue around a [`WorkerHost`].
///
/// Registers the cache worker once per session, turns its lifecycle events
/// and network status changes into notifications, and exposes the cache
/// controls a settings page needs.
pub struct Lifecycle<S> {
    host: Option<Arc<WorkerHost<S>>>,
    notifier: Arc<dyn Notifier>,
    registered: AtomicBool,
    online: watch::Sender<bool>,
    reload: Option<ReloadHook>,
}

impl<S> Lifecycle<S> {
    /// Creates the glue for `host`, starting online.
    pub fn new<N>(host: Arc<WorkerHost<S>>, notifier: N) -> Self
    where
        N: Notifier + 'static,
    {
        Self::with_host(Some(host), Arc::new(notifier))
    }

    /// Creates the glue for an environment without cache worker support.
    ///
    /// Every registration fails with [`LifecycleError::NotSupported`].
    pub fn unsupported<N>(notifier: N) -> Self
    where
        N: Notifier + 'static,
    {
        Self::with_host(None, Arc::new(notifier))
    }

    fn with_host(host: Option<Arc<WorkerHost<S>>>, notifier: Arc<dyn Notifier>) -> Self {
        let (online, _) = watch::channel(true);
        Lifecycle {
            host,
            notifier,
            registered: AtomicBool::new(false),
            online,
            reload: None,
        }
    }

    /// Sets the callback fired by [`skip_waiting_and_reload`](Self::skip_waiting_and_reload).
    pub fn on_reload<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.reload = Some(Arc::new(hook));
        self
    }

    /// Records the network status, notifying only when it changes.
    pub fn set_online(&self, online: bool) {
        let changed = self.online.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
        if !changed {
            return;
        }
        info!(online, "network status changed");
        if online {
            self.notify(CONNECTION_RESTORED, NotificationKind::Success, Duration::from_secs(3));
        } else {
            self.notify(CONNECTION_LOST, NotificationKind::Warning, Duration::from_secs(5));
        }
    }

    /// Last known network status.
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Subscribes to network status changes.
    pub fn network_status(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    fn notify(&self, message: &str, kind: NotificationKind, duration: Duration) {
        self.notifier.notify(message, kind, duration);
    }

    fn host(&self) -> Result<&WorkerHost<S>, LifecycleError> {
        let host = self.host.as_deref().ok_or(LifecycleError::NotSupported)?;
        if !self.registered.load(Ordering::Acquire) {
            return Err(LifecycleError::NotRegistered);
        }
        Ok(host)
    }
}

impl<S: Clone> Lifecycle<S> {
    /// Current registration status.
    pub fn status(&self) -> Status {
        let host = match self.host() {
            Ok(host) => host,
            Err(LifecycleError::NotSupported) => return Status::NotSupported,
            Err(_) => return Status::NotRegistered,
        };
        if host.installing().is_some() {
            Status::Installing
        } else if host.waiting().is_some() {
            Status::Waiting
        } else if host.active().is_some() {
            Status::Active
        } else {
            Status::Unknown
        }
    }

    fn active(&self) -> Result<CacheWorker<S>, LifecycleError> {
        self.host()?.active().ok_or(LifecycleError::NoActiveWorker)
    }
}

impl<S> Lifecycle<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    /// Registers `worker` with the host. Only the first call in a session
    /// does anything.
    ///
    /// Notifies that the app is ready for offline use once the worker takes
    /// control, or that an update is available if it has to wait.
    pub async fn register(
        &self,
        worker: CacheWorker<S>,
    ) -> Result<RegistrationOutcome, LifecycleError> {
        let host = self.host.as_deref().ok_or(LifecycleError::NotSupported)?;
        if self
            .registered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("cache worker already registered");
            return Err(LifecycleError::AlreadyRegistered);
        }

        let outcome = host.register(worker).await?;
        self.announce(outcome);
        Ok(outcome)
    }

    /// Installs a newer worker next to the registered one.
    pub async fn check_for_updates(
        &self,
        worker: CacheWorker<S>,
    ) -> Result<RegistrationOutcome, LifecycleError> {
        let outcome = self.host()?.register(worker).await?;
        self.announce(outcome);
        Ok(outcome)
    }

    fn announce(&self, outcome: RegistrationOutcome) {
        match outcome {
            RegistrationOutcome::Activated => {
                self.notify(OFFLINE_READY, NotificationKind::Success, Duration::from_secs(3));
            }
            RegistrationOutcome::Waiting => {
                self.notify(UPDATE_AVAILABLE, NotificationKind::Info, Duration::from_secs(10));
            }
        }
    }

    /// Tells the waiting worker to skip waiting, promotes it and reloads.
    ///
    /// Returns `false` if no worker was waiting.
    pub async fn skip_waiting_and_reload(&self) -> Result<bool, LifecycleError> {
        let host = self.host()?;
        let Some(waiting) = host.waiting() else {
            return Ok(false);
        };

        waiting.spawn_control().post(ControlMessage::SkipWaiting)?;
        waiting.skip_waiting_requested().await;
        if !host.promote_waiting().await? {
            return Ok(false);
        }

        info!(version = %waiting.config().version, "new worker took control");
        if let Some(reload) = &self.reload {
            reload();
        }
        Ok(true)
    }

    /// Size of the offline cache, network and registration status.
    pub async fn cache_stats(&self) -> Result<CacheStats, LifecycleError> {
        let size = match self.active() {
            Ok(worker) => {
                match worker
                    .spawn_control()
                    .request(ControlMessage::GetCacheSize)
                    .await?
                {
                    Some(ControlReply::Size { size }) => size,
                    _ => return Err(LifecycleError::UnexpectedReply("GET_CACHE_SIZE")),
                }
            }
            // Nothing is cached without a worker in control.
            Err(_) => 0,
        };

        Ok(CacheStats {
            size,
            formatted_size: format_size(size),
            online: self.is_online(),
            status: self.status(),
        })
    }

    /// Deletes every offline cache store.
    pub async fn clear_cache(&self) -> Result<(), LifecycleError> {
        let reply = self
            .active()?
            .spawn_control()
            .request(ControlMessage::ClearCache)
            .await?;
        match reply {
            Some(ControlReply::Cleared { success: true, .. }) => {
                self.notify(CACHE_CLEARED, NotificationKind::Success, Duration::from_secs(3));
                Ok(())
            }
            Some(ControlReply::Cleared { error, .. }) => Err(LifecycleError::ClearFailed(
                error.unwrap_or_else(|| "unknown error".to_owned()),
            )),
            _ => Err(LifecycleError::UnexpectedReply("CLEAR_CACHE")),
        }
    }
}

impl<S> fmt::Debug for Lifecycle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("supported", &self.host.is_some())
            .field("registered", &self.registered.load(Ordering::Relaxed))
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

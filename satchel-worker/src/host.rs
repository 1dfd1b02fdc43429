//! The platform side of the worker lifecycle.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::{Request, Response};
use tower::Service;
use tracing::{debug, info};

use crate::error::BoxError;
use crate::{CacheWorker, WorkerError};

/// Outcome of [`WorkerHost::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The worker took control immediately.
    Activated,
    /// The worker is installed and waits for the current one to go away.
    Waiting,
}

#[derive(Debug)]
struct Slots<S> {
    installing: Option<CacheWorker<S>>,
    waiting: Option<CacheWorker<S>>,
    active: Option<CacheWorker<S>>,
}

/// Drives workers through install and activation.
///
/// Holds at most one installing, one waiting and one active worker. A new
/// worker is activated right away when there is no active worker or when
/// it asked to skip waiting. Otherwise it waits until
/// [`promote_waiting`](Self::promote_waiting).
#[derive(Debug)]
pub struct WorkerHost<S> {
    slots: Mutex<Slots<S>>,
}

impl<S> Default for WorkerHost<S> {
    fn default() -> Self {
        WorkerHost {
            slots: Mutex::new(Slots {
                installing: None,
                waiting: None,
                active: None,
            }),
        }
    }
}

impl<S: Clone> WorkerHost<S> {
    /// Creates a host with no workers.
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, Slots<S>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The worker controlling pages, if any.
    pub fn active(&self) -> Option<CacheWorker<S>> {
        self.slots().active.clone()
    }

    /// The installed worker waiting for activation, if any.
    pub fn waiting(&self) -> Option<CacheWorker<S>> {
        self.slots().waiting.clone()
    }

    /// The worker currently installing, if any.
    pub fn installing(&self) -> Option<CacheWorker<S>> {
        self.slots().installing.clone()
    }

    /// Activates the waiting worker, retiring the active one.
    ///
    /// Returns `false` if no worker was waiting.
    pub async fn promote_waiting(&self) -> Result<bool, WorkerError> {
        let Some(worker) = self.slots().waiting.take() else {
            return Ok(false);
        };
        self.activate(worker).await?;
        Ok(true)
    }

    /// Activates `worker` and makes it the active one.
    ///
    /// On failure the worker goes back to the waiting slot, where
    /// [`promote_waiting`](Self::promote_waiting) can retry it, unless a newer
    /// worker took that slot meanwhile.
    async fn activate(&self, worker: CacheWorker<S>) -> Result<(), WorkerError> {
        if let Err(err) = worker.activate().await {
            let mut slots = self.slots();
            if slots.waiting.is_none() {
                debug!(version = %worker.config().version, "activation failed, worker waits again");
                slots.waiting = Some(worker);
            } else {
                worker.mark_redundant();
            }
            return Err(err);
        }
        let previous = self.slots().active.replace(worker);
        if let Some(previous) = previous {
            debug!(version = %previous.config().version, "retiring previous worker");
            previous.mark_redundant();
        }
        Ok(())
    }
}

impl<S> WorkerHost<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    /// Installs `worker` and activates it if nothing else is in control.
    ///
    /// A failed install leaves the host unchanged apart from clearing the
    /// installing slot.
    pub async fn register(&self, worker: CacheWorker<S>) -> Result<RegistrationOutcome, WorkerError> {
        self.slots().installing = Some(worker.clone());
        let installed = worker.install().await;
        {
            let mut slots = self.slots();
            if slots
                .installing
                .as_ref()
                .is_some_and(|current| current.same_worker(&worker))
            {
                slots.installing = None;
            }
        }
        installed?;

        let take_over = worker.is_skip_waiting() || self.slots().active.is_none();
        if take_over {
            self.activate(worker).await?;
            info!("worker took control");
            return Ok(RegistrationOutcome::Activated);
        }

        let replaced = self.slots().waiting.replace(worker);
        if let Some(replaced) = replaced {
            replaced.mark_redundant();
        }
        info!("worker installed and waiting");
        Ok(RegistrationOutcome::Waiting)
    }
}

//! Admission control and in-flight request de-duplication.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, WeakShared};
use satchel_core::CacheKey;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::{RequestError, ResponseData};

pub(crate) type FlightFuture = BoxFuture<'static, Result<ResponseData, RequestError>>;

/// Bounds the number of requests executing at once.
///
/// Waiters are admitted strictly in arrival order. A permit stays with its
/// request across every retry and is released when the request settles.
#[derive(Debug)]
pub(crate) struct AdmissionQueue {
    semaphore: Arc<Semaphore>,
    limit: usize,
    queued: AtomicUsize,
}

impl AdmissionQueue {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            queued: AtomicUsize::new(0),
        }
    }

    /// Waits for a free slot.
    pub(crate) async fn acquire(&self) -> Result<OwnedSemaphorePermit, RequestError> {
        if let Ok(permit) = self.semaphore.clone().try_acquire_owned() {
            return Ok(permit);
        }

        self.queued.fetch_add(1, Ordering::Relaxed);
        let _queued = QueuedGuard(&self.queued);
        trace!(queued = self.queued(), "Waiting for a request slot");
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RequestError::Cancelled)
    }

    /// Requests currently holding a slot.
    pub(crate) fn active(&self) -> usize {
        self.limit.saturating_sub(self.semaphore.available_permits())
    }

    /// Requests waiting for a slot.
    pub(crate) fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }
}

struct QueuedGuard<'a>(&'a AtomicUsize);

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

struct Slot {
    id: u64,
    flight: Option<WeakShared<FlightFuture>>,
}

/// Result of [`SingleFlight::join_or_lead`].
pub(crate) struct Flight {
    pub(crate) shared: Shared<FlightFuture>,
    /// `true` if an existing execution was joined.
    pub(crate) joined: bool,
}

/// Shares one execution between every concurrent caller with the same key.
///
/// The map only holds weak handles. The last caller dropping its handle
/// cancels the execution, and a finished or cancelled execution removes its
/// own entry.
#[derive(Default)]
pub(crate) struct SingleFlight {
    inflight: Arc<DashMap<CacheKey, Slot>>,
    next_id: AtomicU64,
}

impl SingleFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Joins the running execution for `key`, or starts one from `lead`.
    pub(crate) fn join_or_lead<F>(&self, key: &CacheKey, lead: F) -> Flight
    where
        F: FnOnce() -> FlightFuture,
    {
        match self.inflight.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if let Some(shared) = entry.get().flight.as_ref().and_then(WeakShared::upgrade) {
                    return Flight {
                        shared,
                        joined: true,
                    };
                }
                let (slot, shared) = self.lead(key, lead);
                entry.insert(slot);
                Flight {
                    shared,
                    joined: false,
                }
            }
            Entry::Vacant(entry) => {
                let (slot, shared) = self.lead(key, lead);
                entry.insert(slot);
                Flight {
                    shared,
                    joined: false,
                }
            }
        }
    }

    fn lead<F>(&self, key: &CacheKey, lead: F) -> (Slot, Shared<FlightFuture>)
    where
        F: FnOnce() -> FlightFuture,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = FlightGuard {
            inflight: self.inflight.clone(),
            key: key.clone(),
            id,
        };
        let execution = lead();
        let shared = async move {
            let _guard = guard;
            execution.await
        }
        .boxed()
        .shared();
        let flight = shared.downgrade();
        (Slot { id, flight }, shared)
    }

    /// Number of distinct executions in flight.
    pub(crate) fn len(&self) -> usize {
        self.inflight.len()
    }
}

impl fmt::Debug for SingleFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlight")
            .field("inflight", &self.inflight.len())
            .finish()
    }
}

/// Removes the owning execution's entry when the execution ends.
struct FlightGuard {
    inflight: Arc<DashMap<CacheKey, Slot>>,
    key: CacheKey,
    id: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        // A newer execution may already own the key.
        self.inflight.remove_if(&self.key, |_, slot| slot.id == self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use super::*;

    fn key(url: &str) -> CacheKey {
        CacheKey::from_slice(&[("url", Some(url))])
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_execution() {
        let flights = SingleFlight::new();
        let runs = Arc::new(AtomicU32::new(0));

        let start = |runs: Arc<AtomicU32>| {
            move || -> FlightFuture {
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, RequestError>(ResponseData::Text("done".to_owned()))
                }
                .boxed()
            }
        };

        let first = flights.join_or_lead(&key("/a"), start(runs.clone()));
        let second = flights.join_or_lead(&key("/a"), start(runs.clone()));
        assert!(!first.joined);
        assert!(second.joined);
        assert_eq!(flights.len(), 1);

        let (a, b) = tokio::join!(first.shared, second.shared);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flights.len(), 0);
    }

    #[tokio::test]
    async fn dropped_flight_releases_its_key() {
        let flights = SingleFlight::new();
        let flight = flights.join_or_lead(&key("/a"), || {
            futures::future::pending::<Result<ResponseData, RequestError>>().boxed()
        });
        assert_eq!(flights.len(), 1);
        drop(flight);
        assert_eq!(flights.len(), 0);

        let again = flights.join_or_lead(&key("/a"), || {
            async { Ok::<_, RequestError>(ResponseData::Text("fresh".to_owned())) }.boxed()
        });
        assert!(!again.joined);
    }

    #[tokio::test(start_paused = true)]
    async fn admission_is_fifo_and_bounded() {
        let queue = Arc::new(AdmissionQueue::new(1));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let held = queue.acquire().await.unwrap();
        assert_eq!(queue.active(), 1);

        let mut tasks = Vec::new();
        for id in 0..3 {
            let queue = queue.clone();
            let order = order.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = queue.acquire().await.unwrap();
                order.lock().unwrap().push(id);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }));
            // Let each task enqueue before spawning the next.
            tokio::task::yield_now().await;
        }
        assert_eq!(queue.queued(), 3);

        drop(held);
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(queue.active(), 0);
        assert_eq!(queue.queued(), 0);
    }
}

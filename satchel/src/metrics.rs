//! Performance counters of a [`Client`](crate::Client).
//!
//! Counters always live on the client. With the `metrics` feature they are
//! also mirrored to the [`metrics`](https://docs.rs/metrics) facade.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::ErrorCategory;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track number of requests issued through the client.
    pub static ref REQUESTS_TOTAL: &'static str = {
        metrics::describe_counter!(
            "satchel_requests_total",
            "Total number of requests issued through the client."
        );
        "satchel_requests_total"
    };
    /// Track number of requests answered from the response cache.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "satchel_cache_hit_total",
            "Total number of requests answered from the response cache."
        );
        "satchel_cache_hit_total"
    };
    /// Track number of callers joined to an in-flight request.
    pub static ref DEDUPLICATED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "satchel_deduplicated_total",
            "Total number of callers joined to an identical in-flight request."
        );
        "satchel_deduplicated_total"
    };
    /// Track number of retried attempts.
    pub static ref RETRY_COUNTER: &'static str = {
        metrics::describe_counter!(
            "satchel_retries_total",
            "Total number of retried attempts."
        );
        "satchel_retries_total"
    };
    /// Track number of failed requests per category.
    pub static ref FAILURE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "satchel_failures_total",
            "Total number of failed requests after retries."
        );
        "satchel_failures_total"
    };
    /// Histogram of network request duration.
    pub static ref REQUEST_DURATION: &'static str = {
        metrics::describe_histogram!(
            "satchel_request_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of network requests in seconds, retries included."
        );
        "satchel_request_duration_seconds"
    };
}

/// Live counters, updated by the client.
#[derive(Debug, Default)]
pub(crate) struct PerformanceMetrics {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    cache_hits: AtomicU64,
    total_response_micros: AtomicU64,
}

impl PerformanceMetrics {
    pub(crate) fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!(*REQUESTS_TOTAL).increment(1);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!(*CACHE_HIT_COUNTER).increment(1);
    }

    pub(crate) fn record_joined(&self) {
        #[cfg(feature = "metrics")]
        metrics::counter!(*DEDUPLICATED_COUNTER).increment(1);
    }

    pub(crate) fn record_retry(&self) {
        #[cfg(feature = "metrics")]
        metrics::counter!(*RETRY_COUNTER).increment(1);
    }

    /// Records the settled outcome of one network execution.
    pub(crate) fn record_outcome(&self, failure: Option<ErrorCategory>, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_response_micros.fetch_add(micros, Ordering::Relaxed);
        match failure {
            None => {
                self.successful_requests.fetch_add(1, Ordering::Relaxed);
            }
            Some(_category) => {
                self.failed_requests.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "metrics")]
                metrics::counter!(*FAILURE_COUNTER, "category" => _category.as_str())
                    .increment(1);
            }
        }
        #[cfg(feature = "metrics")]
        metrics::histogram!(
            *REQUEST_DURATION,
            "status" => if failure.is_none() { "success" } else { "failure" }
        )
        .record(elapsed.as_secs_f64());
    }

    pub(crate) fn snapshot(&self, gauges: QueueGauges) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let successful_requests = self.successful_requests.load(Ordering::Relaxed);
        let failed_requests = self.failed_requests.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let executions = successful_requests + failed_requests;

        let average_response_time = if executions == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.total_response_micros.load(Ordering::Relaxed) / executions)
        };

        MetricsSnapshot {
            total_requests,
            successful_requests,
            failed_requests,
            cache_hits,
            average_response_time,
            cache_hit_rate: ratio(cache_hits, total_requests),
            success_rate: ratio(successful_requests, executions),
            cache_size: gauges.cache_size,
            pending_requests: gauges.pending_requests,
            active_requests: gauges.active_requests,
            queued_requests: gauges.queued_requests,
        }
    }
}

/// Point-in-time sizes of the client's shared structures.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct QueueGauges {
    pub(crate) cache_size: usize,
    pub(crate) pending_requests: usize,
    pub(crate) active_requests: usize,
    pub(crate) queued_requests: usize,
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Snapshot returned by [`Client::performance_metrics`](crate::Client::performance_metrics).
///
/// `total_requests` counts every call, cache hits and joined callers
/// included. Success, failure and timing figures count network executions
/// only, one per de-duplicated call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Calls made through the client.
    pub total_requests: u64,
    /// Network executions that succeeded.
    pub successful_requests: u64,
    /// Network executions that failed after retries.
    pub failed_requests: u64,
    /// Calls answered from the response cache.
    pub cache_hits: u64,
    /// Mean duration of a network execution, retries included.
    #[serde(with = "humantime_serde")]
    pub average_response_time: Duration,
    /// `cache_hits / total_requests`, or `0.0` before the first call.
    pub cache_hit_rate: f64,
    /// `successful / (successful + failed)`, or `0.0` before the first execution.
    pub success_rate: f64,
    /// Entries in the response cache.
    pub cache_size: usize,
    /// Distinct requests in flight.
    pub pending_requests: usize,
    /// Requests holding a concurrency slot.
    pub active_requests: usize,
    /// Requests waiting for a slot.
    pub queued_requests: usize,
}

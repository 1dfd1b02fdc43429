//! Scripted transport for client tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, Request, Response, StatusCode};
use satchel::{Transport, TransportError};
use tokio::time::Instant;

/// What the transport does for one call.
pub enum Reply {
    Json(StatusCode, String),
    Text(StatusCode, String),
    Fail(TransportError),
}

impl Reply {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Reply::Json(StatusCode::OK, body.into())
    }

    pub fn status(code: u16) -> Self {
        Reply::Text(StatusCode::from_u16(code).unwrap(), String::new())
    }
}

/// A call seen by the transport.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub uri: String,
    pub body: Bytes,
    pub at: Instant,
}

type Script = dyn Fn(&Request<Bytes>) -> Reply + Send + Sync;

/// Transport answering from a script after a fixed latency.
#[derive(Clone)]
pub struct MockTransport {
    script: Arc<Script>,
    latency: Duration,
    calls: Arc<Mutex<Vec<Call>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Request<Bytes>) -> Reply + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(script),
            latency: Duration::ZERO,
            calls: Arc::default(),
            active: Arc::default(),
            max_active: Arc::default(),
        }
    }

    /// Echoes the request path as JSON.
    pub fn echo() -> Self {
        Self::new(|req| Reply::ok_json(format!(r#"{{"path":"{}"}}"#, req.uri())))
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        Self { latency, ..self }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        self.calls.lock().unwrap().push(Call {
            method: request.method().clone(),
            uri: request.uri().to_string(),
            body: request.body().clone(),
            at: Instant::now(),
        });
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _active = ActiveGuard(self.active.clone());

        let reply = (self.script)(&request);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match reply {
            Reply::Json(status, body) => Ok(Response::builder()
                .status(status)
                .header(CONTENT_TYPE, "application/json")
                .body(Bytes::from(body))
                .unwrap()),
            Reply::Text(status, body) => Ok(Response::builder()
                .status(status)
                .header(CONTENT_TYPE, "text/plain")
                .body(Bytes::from(body))
                .unwrap()),
            Reply::Fail(error) => Err(error),
        }
    }
}

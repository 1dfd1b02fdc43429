//! Two-way control channel between pages and a worker.
//!
//! Pages post [`ControlMessage`]s. Messages that expect an answer carry a
//! reply port, which receives exactly one [`ControlReply`].

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{CacheWorker, WorkerError};

/// A message posted to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate without waiting. Has no reply.
    SkipWaiting,
    /// Delete every cache store.
    ClearCache,
    /// Report the total stored body size.
    GetCacheSize,
}

/// The answer to a [`ControlMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply {
    /// Outcome of [`ControlMessage::ClearCache`].
    Cleared {
        /// Whether every store was deleted.
        success: bool,
        /// Failure description.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Answer to [`ControlMessage::GetCacheSize`].
    Size {
        /// Total stored body size in bytes.
        size: u64,
    },
}

impl<S> CacheWorker<S> {
    /// Handles one control message.
    ///
    /// Returns the reply to send back, or `None` for messages without one.
    /// Failures are reported inside the reply, never as an error.
    pub async fn handle_message(&self, message: ControlMessage) -> Option<ControlReply> {
        debug!(?message, "control message");
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting();
                None
            }
            ControlMessage::ClearCache => Some(match self.clear_all().await {
                Ok(_) => ControlReply::Cleared {
                    success: true,
                    error: None,
                },
                Err(err) => ControlReply::Cleared {
                    success: false,
                    error: Some(err.to_string()),
                },
            }),
            ControlMessage::GetCacheSize => {
                let size = self.cache_size().await.unwrap_or_else(|err| {
                    warn!(error = %err, "failed to measure cache size");
                    0
                });
                Some(ControlReply::Size { size })
            }
        }
    }
}

impl<S> CacheWorker<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Serves the control channel on a background task.
    ///
    /// The task stops when every [`ControlHandle`] is dropped.
    pub fn spawn_control(&self) -> ControlHandle {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Envelope>();
        let worker = self.clone();
        tokio::spawn(async move {
            while let Some(Envelope { message, reply }) = receiver.recv().await {
                let answer = worker.handle_message(message).await;
                if let (Some(port), Some(answer)) = (reply, answer) {
                    // The page may have stopped listening.
                    let _ = port.send(answer);
                }
            }
            debug!("control channel closed");
        });
        ControlHandle { sender }
    }
}

struct Envelope {
    message: ControlMessage,
    reply: Option<oneshot::Sender<ControlReply>>,
}

/// Page-side end of a worker's control channel.
#[derive(Clone, Debug)]
pub struct ControlHandle {
    sender: mpsc::UnboundedSender<Envelope>,
}

impl ControlHandle {
    /// Posts `message` without waiting for a reply.
    pub fn post(&self, message: ControlMessage) -> Result<(), WorkerError> {
        self.sender
            .send(Envelope {
                message,
                reply: None,
            })
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Posts `message` and waits for its reply.
    ///
    /// Resolves to `None` for messages that have no reply.
    pub async fn request(
        &self,
        message: ControlMessage,
    ) -> Result<Option<ControlReply>, WorkerError> {
        let (port, reply) = oneshot::channel();
        self.sender
            .send(Envelope {
                message,
                reply: Some(port),
            })
            .map_err(|_| WorkerError::ChannelClosed)?;
        // A message without a reply drops the port unanswered.
        Ok(reply.await.ok())
    }
}

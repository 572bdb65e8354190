//! Upstream AI workflow backend.
//!
//! DESIGN
//! ======
//! `agui:start` opens one websocket client connection to the workflow
//! backend, sends a `start` message, and hands back a bounded receiver of raw
//! text messages (one AGUI event each). A spawned forwarder owns the socket
//! and pushes messages into the channel until the backend closes or the
//! receiver is dropped; dropping the receiver is how a session cancels.
//!
//! The `WorkflowBackend` trait is the seam tests use to inject canned streams.

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Buffered upstream messages per session.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow backend not configured")]
    NotConfigured,
    #[error("workflow backend connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("workflow start failed: {0}")]
    Start(String),
}

impl crate::frame::ErrorCode for WorkflowError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "E_WORKFLOW_NOT_CONFIGURED",
            Self::Connect(_) => "E_WORKFLOW_CONNECT",
            Self::Start(_) => "E_WORKFLOW_START",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Start(_))
    }
}

/// What the backend is asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRequest {
    pub prompt: String,
    pub organization_id: Uuid,
    pub request_id: Option<Uuid>,
}

#[derive(Serialize)]
struct StartMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    prompt: &'a str,
    organization_id: Uuid,
    request_id: Option<Uuid>,
}

impl WorkflowRequest {
    /// The `start` message sent after connecting.
    ///
    /// # Errors
    ///
    /// Returns a serialization error (not expected for these field types).
    pub fn start_message(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&StartMessage {
            kind: "start",
            prompt: &self.prompt,
            organization_id: self.organization_id,
            request_id: self.request_id,
        })
    }
}

#[async_trait::async_trait]
pub trait WorkflowBackend: Send + Sync {
    /// Start a workflow and stream its raw event messages.
    async fn start(&self, request: &WorkflowRequest) -> Result<mpsc::Receiver<String>, WorkflowError>;
}

// =============================================================================
// WEBSOCKET BACKEND
// =============================================================================

pub struct WsWorkflowBackend {
    url: String,
}

impl WsWorkflowBackend {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait::async_trait]
impl WorkflowBackend for WsWorkflowBackend {
    async fn start(&self, request: &WorkflowRequest) -> Result<mpsc::Receiver<String>, WorkflowError> {
        let (mut stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| WorkflowError::Connect(Box::new(e)))?;

        let start = request
            .start_message()
            .map_err(|e| WorkflowError::Start(e.to_string()))?;
        stream
            .send(Message::text(start))
            .await
            .map_err(|e| WorkflowError::Start(e.to_string()))?;

        info!(url = %self.url, organization_id = %request.organization_id, "workflow: started");

        let (tx, rx) = mpsc::channel::<String>(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = stream.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if tx.send(text.to_string()).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(error = %e, "workflow: upstream read failed");
                                break;
                            }
                        }
                    }
                    () = tx.closed() => break,
                }
            }
            let _ = stream.close(None).await;
            debug!("workflow: forwarder finished");
        });

        Ok(rx)
    }
}

#[cfg(test)]
#[path = "workflow_test.rs"]
mod tests;

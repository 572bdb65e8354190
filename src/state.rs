//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, the component registry (built once in `main`,
//! read-only afterwards), and the optional integrations. Per-connection AGUI
//! sessions are owned by their websocket tasks, not stored here.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::agui::Registry;
use crate::services::email::GmailClient;
use crate::services::thread::ThreadWrite;
use crate::services::workflow::WorkflowBackend;

/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub registry: Arc<Registry>,
    /// Upstream workflow backend. `None` if `AGUI_BACKEND_URL` is not set.
    pub workflow: Option<Arc<dyn WorkflowBackend>>,
    /// Gmail sender. `None` if Gmail credentials are not set.
    pub mailer: Option<Arc<GmailClient>>,
    pub stripe_webhook_secret: Option<Arc<str>>,
    /// Ordered suggestion-thread writes. `None` disables thread recording.
    pub thread_tx: Option<mpsc::Sender<ThreadWrite>>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, registry: Arc<Registry>) -> Self {
        Self { pool, registry, workflow: None, mailer: None, stripe_webhook_secret: None, thread_tx: None }
    }

    #[must_use]
    pub fn with_thread_writer(mut self, tx: mpsc::Sender<ThreadWrite>) -> Self {
        self.thread_tx = Some(tx);
        self
    }

    #[must_use]
    pub fn with_workflow(mut self, workflow: Arc<dyn WorkflowBackend>) -> Self {
        self.workflow = Some(workflow);
        self
    }

    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<GmailClient>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    #[must_use]
    pub fn with_stripe_webhook_secret(mut self, secret: impl Into<Arc<str>>) -> Self {
        self.stripe_webhook_secret = Some(secret.into());
        self
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

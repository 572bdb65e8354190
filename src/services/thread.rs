//! Suggestion threads: durable record of AGUI sessions.
//!
//! A thread row is keyed by the AGUI session id. The websocket route writes
//! it on `agui:start` and updates the last rendered component/phase as events
//! arrive. Writes are best-effort; the live session never waits on them.
//!
//! All writes go through one queue drained by a single writer task, so they
//! reach the database in the order they were enqueued: a thread's create
//! lands before its renders, and its last render is the one that sticks.

use serde::Serialize;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agui::Phase;

/// Pending thread writes before enqueue starts dropping.
pub const THREAD_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error("suggestion thread not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for ThreadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_THREAD_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Fields captured when a workflow starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThread {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub request_id: Option<Uuid>,
    pub prompt: String,
}

/// One queued thread write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadWrite {
    Create(NewThread),
    Render { id: Uuid, component: String, phase: Phase },
}

impl ThreadWrite {
    #[must_use]
    pub fn thread_id(&self) -> Uuid {
        match self {
            Self::Create(thread) => thread.id,
            Self::Render { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionThread {
    pub id: Uuid,
    pub request_id: Option<Uuid>,
    pub prompt: String,
    pub last_component: Option<String>,
    pub last_phase: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Insert a thread row.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_thread(pool: &PgPool, thread: &NewThread) -> Result<(), ThreadError> {
    sqlx::query(
        r"INSERT INTO suggestion_threads (id, organization_id, user_id, request_id, prompt)
          VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(thread.id)
    .bind(thread.organization_id)
    .bind(thread.user_id)
    .bind(thread.request_id)
    .bind(&thread.prompt)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record the latest rendered component and phase.
///
/// # Errors
///
/// Returns `NotFound` if the thread row does not exist.
pub async fn record_render(pool: &PgPool, id: Uuid, component: &str, phase: Phase) -> Result<(), ThreadError> {
    let result = sqlx::query(
        "UPDATE suggestion_threads SET last_component = $2, last_phase = $3, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(component)
    .bind(phase.as_str())
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ThreadError::NotFound(id));
    }
    Ok(())
}

/// Recent threads in an organization, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_recent(pool: &PgPool, organization_id: Uuid, limit: i64) -> Result<Vec<SuggestionThread>, ThreadError> {
    let rows = sqlx::query(
        r"SELECT id, request_id, prompt, last_component, last_phase, updated_at
          FROM suggestion_threads
          WHERE organization_id = $1
          ORDER BY updated_at DESC
          LIMIT $2",
    )
    .bind(organization_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| SuggestionThread {
            id: r.get("id"),
            request_id: r.get("request_id"),
            prompt: r.get("prompt"),
            last_component: r.get("last_component"),
            last_phase: r.get("last_phase"),
            updated_at: r.get("updated_at"),
        })
        .collect())
}

// =============================================================================
// WRITER
// =============================================================================

/// Apply one queued write.
///
/// # Errors
///
/// Returns the error of the underlying create or update.
pub async fn apply(pool: &PgPool, write: &ThreadWrite) -> Result<(), ThreadError> {
    match write {
        ThreadWrite::Create(thread) => create_thread(pool, thread).await,
        ThreadWrite::Render { id, component, phase } => record_render(pool, *id, component, *phase).await,
    }
}

/// Drain the queue in order until every sender is dropped.
pub async fn run_thread_writer(pool: PgPool, mut rx: mpsc::Receiver<ThreadWrite>) {
    while let Some(write) = rx.recv().await {
        if let Err(e) = apply(&pool, &write).await {
            warn!(error = %e, thread_id = %write.thread_id(), "thread write failed");
        }
    }
    debug!("thread writer stopped");
}

/// Spawn the thread writer and return its queue sender.
#[must_use]
pub fn spawn_thread_writer(pool: PgPool) -> mpsc::Sender<ThreadWrite> {
    let (tx, rx) = mpsc::channel(THREAD_QUEUE_CAPACITY);
    info!(queue_capacity = THREAD_QUEUE_CAPACITY, "thread writer started");
    tokio::spawn(run_thread_writer(pool, rx));
    tx
}

/// Best-effort, non-blocking enqueue.
pub fn enqueue(tx: &mpsc::Sender<ThreadWrite>, write: ThreadWrite) {
    match tx.try_send(write) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(write)) => {
            warn!(thread_id = %write.thread_id(), "thread write queue full; dropping write");
        }
        Err(mpsc::error::TrySendError::Closed(write)) => {
            warn!(thread_id = %write.thread_id(), "thread writer stopped; dropping write");
        }
    }
}

#[cfg(test)]
#[path = "thread_test.rs"]
mod tests;

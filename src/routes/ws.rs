//! WebSocket handler: the AGUI session transport.
//!
//! DESIGN
//! ======
//! On upgrade, the connection gets a client ID and its own `Dispatcher`,
//! then enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall
//! - Upstream workflow messages → dispatcher → `agui:render` push
//!
//! Handler functions are pure business logic: they drive the dispatcher and
//! return an `Outcome`. The dispatch layer owns all outbound concerns:
//! reply to sender, render pushes, and thread bookkeeping.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. `agui:start` → reset session, open upstream stream
//! 3. Each upstream message or `agui:event` → dispatch → `agui:render`
//! 4. `agui:cancel` / close → upstream receiver dropped, forwarder stops

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::agui::render_data;
use crate::agui::{Dispatch, Dispatcher, Stage, WorkflowEvent};
use crate::frame::{Data, ErrorCode, Frame, Status};
use crate::services::thread::{self, NewThread, ThreadWrite};
use crate::services::workflow::{WorkflowError, WorkflowRequest};
use crate::services::session;
use crate::state::AppState;

const RENDER_SYSCALL: &str = "agui:render";

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide what the client receives; handlers never send frames directly.
enum Outcome {
    /// Send done+data to sender.
    Reply(Data),
    /// Send empty done to sender.
    Done,
    /// The dispatcher rendered: reply with the render payload and push
    /// `agui:render`.
    Rendered,
    /// The dispatcher was terminal and dropped the event.
    Ignored,
    /// A collaborator failed and the error card was rendered: push
    /// `agui:render`, then the error reply.
    Failed(Frame),
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Per-connection AGUI session state. Owned by the connection task.
pub(crate) struct Connection {
    pub(crate) client_id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) organization_id: Option<Uuid>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) upstream: Option<mpsc::Receiver<String>>,
    /// Whether the current session has a `suggestion_threads` row.
    pub(crate) thread_open: bool,
}

impl Connection {
    pub(crate) fn new(state: &AppState, user_id: Uuid, organization_id: Option<Uuid>) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            user_id,
            organization_id,
            dispatcher: Dispatcher::new(state.registry.clone()),
            upstream: None,
            thread_open: false,
        }
    }

    /// The current render state as an `agui:render` push, if anything is rendered.
    fn render_frame(&self) -> Option<Frame> {
        let render = self.dispatcher.state()?;
        Some(Frame::request(RENDER_SYSCALL, render_data(render)).with_session_id(self.dispatcher.session_id()))
    }

    fn session_data(&self) -> Data {
        let mut data = Data::new();
        data.insert("session_id".into(), serde_json::json!(self.dispatcher.session_id()));
        data.insert("phase".into(), serde_json::json!(self.dispatcher.phase().as_str()));
        data.insert("applied".into(), serde_json::json!(self.dispatcher.applied()));
        data
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return (StatusCode::UNAUTHORIZED, "ticket required").into_response();
    };

    let token = match session::consume_ws_ticket(&state.pool, ticket).await {
        Ok(Some(token)) => token,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ws ticket validation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error").into_response();
        }
    };

    let context = match session::get_session(&state.pool, &token).await {
        Ok(Some(context)) => context,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "session expired").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ws session lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "session lookup error").into_response();
        }
    };

    let user_id = context.user.id;
    let organization_id = context.current_organization.map(|o| o.id);
    ws.on_upgrade(move |socket| run_ws(socket, state, user_id, organization_id))
}

async fn run_ws(mut socket: WebSocket, state: AppState, user_id: Uuid, organization_id: Option<Uuid>) {
    let mut conn = Connection::new(&state, user_id, organization_id);
    let client_id = conn.client_id;

    let mut welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("user_id", user_id.to_string());
    if let Some(org) = organization_id {
        welcome = welcome.with_data("organization_id", org.to_string());
    }
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, %user_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let frames = process_inbound_text(&state, &mut conn, &text).await;
                        if send_all(&mut socket, &frames).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            upstream = recv_upstream(&mut conn.upstream) => {
                let frames = match upstream {
                    Some(text) => process_upstream_text(&state, &mut conn, &text),
                    None => {
                        info!(%client_id, session_id = %conn.dispatcher.session_id(), "ws: upstream finished");
                        conn.upstream = None;
                        Vec::new()
                    }
                };
                if send_all(&mut socket, &frames).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(%client_id, "ws: client disconnected");
}

/// Next upstream message; pending forever when no workflow is running.
async fn recv_upstream(upstream: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match upstream {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// =============================================================================
// UPSTREAM
// =============================================================================

/// Apply one upstream workflow message and return frames for the client.
pub(crate) fn process_upstream_text(state: &AppState, conn: &mut Connection, text: &str) -> Vec<Frame> {
    match conn.dispatcher.on_text(text) {
        Ok(Dispatch::Rendered) => {
            if let Some(render) = conn.dispatcher.state() {
                debug!(
                    session_id = %conn.dispatcher.session_id(),
                    kind = render.widget.kind(),
                    stage = render.stage.map(Stage::as_str),
                    message = render.widget.message(),
                    "ws: upstream event rendered"
                );
            }
            enqueue_thread_render(state, conn);
            conn.render_frame().into_iter().collect()
        }
        Ok(Dispatch::Ignored) => Vec::new(),
        Err(e) => {
            warn!(client_id = %conn.client_id, session_id = %conn.dispatcher.session_id(), error = %e, code = e.error_code(), "ws: malformed upstream event");
            Vec::new()
        }
    }
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// Kept separate from the websocket transport so tests can exercise frame
/// dispatch end-to-end.
pub(crate) async fn process_inbound_text(state: &AppState, conn: &mut Connection, text: &str) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(client_id = %conn.client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Stamp the authenticated user_id as `from`.
    req.from = Some(conn.user_id.to_string());
    info!(client_id = %conn.client_id, id = %req.id, syscall = %req.syscall, status = ?req.status, "ws: recv frame");

    let result = match req.prefix() {
        "agui" => handle_agui(state, conn, &req).await,
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Ok(Outcome::Rendered) => {
            enqueue_thread_render(state, conn);
            let mut frames = Vec::with_capacity(2);
            if let Some(render) = conn.dispatcher.state() {
                frames.push(req.done_with(render_data(render)));
            }
            frames.extend(conn.render_frame());
            frames
        }
        Ok(Outcome::Ignored) => {
            let mut data = conn.session_data();
            data.insert("ignored".into(), serde_json::Value::Bool(true));
            vec![req.done_with(data)]
        }
        Ok(Outcome::Failed(err_frame)) => {
            let mut frames: Vec<Frame> = conn.render_frame().into_iter().collect();
            frames.push(err_frame);
            frames
        }
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// AGUI HANDLERS
// =============================================================================

async fn handle_agui(state: &AppState, conn: &mut Connection, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "start" => handle_start(state, conn, req).await,
        "event" => {
            let object: serde_json::Map<String, serde_json::Value> =
                req.data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let event = WorkflowEvent::from_value(serde_json::Value::Object(object)).map_err(|e| {
                warn!(client_id = %conn.client_id, error = %e, "ws: malformed client event");
                req.error_from(&e)
            })?;
            match conn.dispatcher.on_event(event) {
                Ok(Dispatch::Rendered) => Ok(Outcome::Rendered),
                Ok(Dispatch::Ignored) => Ok(Outcome::Ignored),
                Err(e) => {
                    warn!(client_id = %conn.client_id, error = %e, "ws: malformed client event");
                    Err(req.error_from(&e))
                }
            }
        }
        "reset" => {
            conn.upstream = None;
            conn.thread_open = false;
            conn.dispatcher.reset();
            Ok(Outcome::Reply(conn.session_data()))
        }
        "cancel" => {
            if conn.upstream.take().is_some() {
                info!(client_id = %conn.client_id, session_id = %conn.dispatcher.session_id(), "ws: upstream cancelled");
            }
            Ok(Outcome::Done)
        }
        "state" => {
            let mut data = conn.session_data();
            let render = conn
                .dispatcher
                .state()
                .map_or(serde_json::Value::Null, |r| serde_json::Value::Object(render_data(r).into_iter().collect()));
            data.insert("render".into(), render);
            Ok(Outcome::Reply(data))
        }
        op => Err(req.error(format!("unknown agui op: {op}"))),
    }
}

async fn handle_start(state: &AppState, conn: &mut Connection, req: &Frame) -> Result<Outcome, Frame> {
    let prompt = req
        .data
        .get("prompt")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    if prompt.is_empty() {
        return Err(req.error("prompt required"));
    }
    let Some(organization_id) = conn.organization_id else {
        return Err(req.error("no current organization"));
    };
    let request_id = match req.data.get("request_id") {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => Some(
            value
                .as_str()
                .and_then(|s| s.parse::<Uuid>().ok())
                .ok_or_else(|| req.error("request_id must be a uuid"))?,
        ),
    };

    // Drop any running stream before starting a new session.
    conn.upstream = None;
    conn.thread_open = false;
    let session_id = conn.dispatcher.reset();

    let Some(workflow) = state.workflow.clone() else {
        return Ok(fail_session(conn, req, &WorkflowError::NotConfigured));
    };

    let request = WorkflowRequest { prompt: prompt.to_owned(), organization_id, request_id };
    match workflow.start(&request).await {
        Ok(rx) => {
            conn.upstream = Some(rx);
            conn.thread_open = true;
            enqueue_thread_create(
                state,
                NewThread { id: session_id, organization_id, user_id: conn.user_id, request_id, prompt: request.prompt },
            );
            info!(client_id = %conn.client_id, %session_id, "ws: workflow started");
            Ok(Outcome::Reply(conn.session_data()))
        }
        Err(e) => {
            warn!(client_id = %conn.client_id, %session_id, error = %e, "ws: workflow start failed");
            Ok(fail_session(conn, req, &e))
        }
    }
}

/// Render a collaborator failure as the session's error card.
fn fail_session(conn: &mut Connection, req: &Frame, err: &WorkflowError) -> Outcome {
    conn.dispatcher
        .fail(err.to_string(), Some(err.error_code()), err.retryable());
    Outcome::Failed(req.error_from(err).with_session_id(conn.dispatcher.session_id()))
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_all(socket: &mut WebSocket, frames: &[Frame]) -> Result<(), ()> {
    for frame in frames {
        send_frame(socket, frame).await?;
    }
    Ok(())
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

/// Queue the thread row insert.
fn enqueue_thread_create(state: &AppState, new_thread: NewThread) {
    if let Some(tx) = &state.thread_tx {
        thread::enqueue(tx, ThreadWrite::Create(new_thread));
    }
}

/// Queue the latest render for the thread, behind its create.
fn enqueue_thread_render(state: &AppState, conn: &Connection) {
    if !conn.thread_open {
        return;
    }
    let (Some(tx), Some(render)) = (&state.thread_tx, conn.dispatcher.state()) else {
        return;
    };
    thread::enqueue(
        tx,
        ThreadWrite::Render { id: conn.dispatcher.session_id(), component: render.component.clone(), phase: render.phase },
    );
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

//! AGUI HTTP routes: stateless preview, component listing, recent threads.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use super::auth::AuthUser;
use crate::agui::{ComponentName, EventError, RenderState, WorkflowEvent, render_html};
use crate::frame::{Data, ErrorCode, FRAME_CODE, FRAME_MESSAGE};
use crate::services::thread::{self, SuggestionThread};
use crate::state::AppState;

const RECENT_THREADS: i64 = 20;

/// Render payload pushed to clients: the serialized state plus its HTML.
pub(crate) fn render_data(state: &RenderState) -> Data {
    let mut data: Data = match serde_json::to_value(state) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Data::new(),
    };
    data.insert("html".into(), serde_json::Value::String(render_html(state)));
    data
}

pub(crate) fn event_error_response(err: &EventError) -> Response {
    let body = serde_json::json!({ FRAME_CODE: err.error_code(), FRAME_MESSAGE: err.to_string() });
    (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
}

/// `POST /api/agui/preview`: render one event without a session.
pub async fn preview(State(state): State<AppState>, Json(body): Json<serde_json::Value>) -> Response {
    let rendered = WorkflowEvent::from_value(body).and_then(|event| RenderState::from_event(&state.registry, event));
    match rendered {
        Ok(render) => Json(render_data(&render)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "agui preview rejected");
            event_error_response(&e)
        }
    }
}

/// `GET /api/agui/components`
pub async fn components(State(state): State<AppState>) -> Json<Vec<ComponentName>> {
    Json(state.registry.names())
}

/// `GET /api/agui/threads`: recent suggestion threads of the current organization.
pub async fn threads(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<SuggestionThread>>, StatusCode> {
    let org = auth.organization()?;
    thread::list_recent(&state.pool, org.id, RECENT_THREADS)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "thread listing failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

#[cfg(test)]
#[path = "agui_test.rs"]
mod tests;

//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API, the Stripe webhook, and the AGUI
//! websocket under a single Axum router. Page layout is served elsewhere.

pub mod agui;
pub mod auth;
pub mod integrations;
pub mod procurement;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        .route("/api/auth/organization", post(auth::switch_organization))
        .route("/api/organizations", get(procurement::list_organizations))
        .route("/api/organizations/{id}/members", get(procurement::list_members))
        .route("/api/requests", get(procurement::list_requests).post(procurement::create_request))
        .route("/api/requests/{id}", get(procurement::get_request))
        .route("/api/requests/{id}/quotes", get(procurement::list_quotes))
        .route("/api/quotes/{id}/approve", post(procurement::approve_quote))
        .route("/api/vendors", get(procurement::list_vendors))
        .route("/api/agui/preview", post(agui::preview))
        .route("/api/agui/components", get(agui::components))
        .route("/api/agui/threads", get(agui::threads))
        .route("/api/webhooks/stripe", post(integrations::stripe_webhook))
        .route("/api/integrations/gmail", get(integrations::gmail_status))
        .route("/api/integrations/gmail/send", post(integrations::gmail_send))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

mod agui;
mod config;
mod db;
mod frame;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::email::GmailClient;
use services::workflow::WsWorkflowBackend;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    let registry = agui::Registry::standard().expect("component registry");
    tracing::info!(components = registry.names().len(), "component registry built");

    let thread_tx = services::thread::spawn_thread_writer(pool.clone());
    let mut state = state::AppState::new(pool, Arc::new(registry)).with_thread_writer(thread_tx);

    // Optional integrations: each stays disabled when its env vars are missing.
    match &config.agui_backend_url {
        Some(url) => {
            tracing::info!(%url, "workflow backend configured");
            state = state.with_workflow(Arc::new(WsWorkflowBackend::new(url.clone())));
        }
        None => tracing::warn!("AGUI_BACKEND_URL not set; agui:start disabled"),
    }
    match config.gmail.clone().map(GmailClient::new) {
        Some(Ok(mailer)) => {
            tracing::info!(sender = mailer.sender(), "gmail configured");
            state = state.with_mailer(Arc::new(mailer));
        }
        Some(Err(e)) => tracing::warn!(error = %e, "gmail client failed; email disabled"),
        None => tracing::warn!("gmail not configured; email disabled"),
    }
    if let Some(secret) = config.stripe_webhook_secret.as_deref() {
        state = state.with_stripe_webhook_secret(secret);
    } else {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set; webhook signatures not verified");
    }

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "procura listening");
    axum::serve(listener, app).await.expect("server failed");
}

pub mod dev;
pub mod events;
pub mod health;
pub mod sessions;
pub mod webhook;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::state::AppState;

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/webhook/chat", post(webhook::chat_webhook))
        .route("/api/dev/message", post(dev::send_message))
        .route(
            "/api/sessions/:thread_id",
            get(sessions::get_session).delete(sessions::evict_session),
        )
        .route(
            "/api/sessions/:thread_id/events",
            get(sessions::get_session_events),
        )
        .route("/api/events", get(events::events_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

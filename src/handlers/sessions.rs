use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::events;
use crate::state::AppState;

use super::check_auth;

// GET /api/sessions/:thread_id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(thread_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let session = state
        .sessions
        .get(&thread_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("session {thread_id}")))?;

    Ok(Json(
        serde_json::to_value(session).map_err(anyhow::Error::from)?,
    ))
}

// DELETE /api/sessions/:thread_id
pub async fn evict_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(thread_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let lock = state.thread_locks.for_thread(&thread_id);
    let removed = {
        let _guard = lock.lock().await;
        state.sessions.evict(&thread_id).await?
    };
    drop(lock);
    state.thread_locks.forget(&thread_id);

    if !removed {
        return Err(AppError::NotFound(format!("session {thread_id}")));
    }
    tracing::info!(thread_id = %thread_id, "session evicted");
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct EventsQuery {
    pub limit: Option<i64>,
}

// GET /api/sessions/:thread_id/events
pub async fn get_session_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(thread_id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(200).clamp(1, 1000);
    let events = events::thread_events(&state, &thread_id, limit)?;
    Ok(Json(serde_json::to_value(events).map_err(anyhow::Error::from)?))
}

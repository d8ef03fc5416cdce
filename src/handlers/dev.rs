use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::conversation::{self, ChatReply, IncomingMessage};
use crate::state::AppState;

use super::webhook;

#[derive(Deserialize)]
pub struct DevMessage {
    #[serde(default = "default_thread")]
    pub thread_id: String,
    #[serde(default = "default_sender")]
    pub sender: String,
    pub text: String,
}

fn default_thread() -> String {
    "dev".to_string()
}

fn default_sender() -> String {
    "dev".to_string()
}

// POST /api/dev/message, unsigned for local testing
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DevMessage>,
) -> Result<Json<ChatReply>, AppError> {
    let incoming = webhook::normalize(IncomingMessage {
        thread_id: payload.thread_id,
        sender: payload.sender,
        text: payload.text,
        timestamp: None,
    })?;

    let reply = conversation::process_message(&state, incoming).await?;
    Ok(Json(reply))
}

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::errors::AppError;
use crate::services::conversation::{self, IncomingMessage};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-petpro-signature";

/// HMAC-SHA1 of the raw request body, base64 encoded.
pub fn sign_body(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

fn validate_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    let mut mac = match Hmac::<Sha1>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

// POST /webhook/chat
pub async fn chat_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    // Signature check is skipped when no secret is configured (dev mode)
    if !state.config.webhook_secret.is_empty() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            tracing::warn!("missing webhook signature header");
            return Err(AppError::Forbidden("missing signature".to_string()));
        }
        if !validate_signature(&state.config.webhook_secret, signature, &body) {
            tracing::warn!("invalid webhook signature");
            return Err(AppError::Forbidden("invalid signature".to_string()));
        }
    }

    let incoming: IncomingMessage = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid message payload: {e}")))?;

    let incoming = normalize(incoming)?;
    tracing::info!(thread_id = %incoming.thread_id, sender = %incoming.sender, "incoming chat message");

    let reply = conversation::process_message(&state, incoming).await?;
    Ok((StatusCode::OK, Json(reply)).into_response())
}

pub(crate) fn normalize(mut incoming: IncomingMessage) -> Result<IncomingMessage, AppError> {
    incoming.thread_id = incoming.thread_id.trim().to_string();
    incoming.sender = incoming.sender.trim().to_string();
    incoming.text = incoming.text.trim().to_string();
    if incoming.thread_id.is_empty() || incoming.text.is_empty() {
        return Err(AppError::BadRequest(
            "thread_id and text are required".to_string(),
        ));
    }
    if incoming.sender.is_empty() {
        incoming.sender = "unknown".to_string();
    }
    Ok(incoming)
}

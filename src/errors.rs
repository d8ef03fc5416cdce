use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::workflow::WorkflowStep;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// Why a message did not end in a booking write.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error("could not classify message: {0}")]
    Extraction(String),

    #[error("{step} cannot run: {reason}")]
    Validation { step: WorkflowStep, reason: String },

    #[error("booking overlaps existing booking {booking_id} ({window})")]
    Conflict { booking_id: String, window: String },

    #[error("{step} failed after {attempts} attempts: {message}")]
    TransientRemote {
        step: WorkflowStep,
        attempts: u32,
        message: String,
    },

    #[error("{step} rejected by remote API: {message}")]
    PermanentRemote { step: WorkflowStep, message: String },
}

impl WorkflowError {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Extraction(_) => "extraction",
            WorkflowError::Validation { .. } => "validation",
            WorkflowError::Conflict { .. } => "conflict",
            WorkflowError::TransientRemote { .. } => "transient_remote",
            WorkflowError::PermanentRemote { .. } => "permanent_remote",
        }
    }

    pub fn step(&self) -> Option<WorkflowStep> {
        match self {
            WorkflowError::Extraction(_) => None,
            WorkflowError::Validation { step, .. }
            | WorkflowError::TransientRemote { step, .. }
            | WorkflowError::PermanentRemote { step, .. } => Some(*step),
            WorkflowError::Conflict { .. } => Some(WorkflowStep::EnsureBooking),
        }
    }

    /// Chat-facing explanation; never includes raw API payloads.
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::Extraction(_) => {
                "Sorry, I didn't quite catch that. Could you rephrase?".to_string()
            }
            WorkflowError::Validation { step, reason } => match step {
                WorkflowStep::EnsureCustomer => {
                    "I need the customer's name, email or phone number before I can book this."
                        .to_string()
                }
                WorkflowStep::EnsurePets => format!(
                    "I couldn't set up the pet profiles yet ({reason}). Could you tell me the pet names and what kind of animals they are?"
                ),
                WorkflowStep::EnsureService => format!(
                    "I couldn't match the requested service ({reason}). Which service should I book?"
                ),
                WorkflowStep::ResolveDates => format!(
                    "I'm not sure which dates you mean ({reason}). Could you give the exact dates and times?"
                ),
                WorkflowStep::EnsureBooking => format!(
                    "I couldn't save the booking yet ({reason})."
                ),
            },
            WorkflowError::Conflict { window, .. } => format!(
                "That overlaps another booking ({window}). Could you confirm a different time?"
            ),
            WorkflowError::TransientRemote { .. } => {
                "The booking system isn't responding right now. Confirm again in a moment and I'll retry."
                    .to_string()
            }
            WorkflowError::PermanentRemote { .. } => {
                "The booking system rejected the request. Please check the details and confirm again."
                    .to_string()
            }
        }
    }
}

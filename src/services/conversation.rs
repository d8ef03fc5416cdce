use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::WorkflowError;
use crate::models::{BookingBuffer, ConversationSession, ExtractedEntities, GateState, Intent};
use crate::services::ai::intent::ExtractionContext;
use crate::services::events::record_event;
use crate::services::gate::{self, GateAction, GateEvent};
use crate::services::resolver::{names_other_customer, resolve, BookingAction};
use crate::services::workflow::{BookingWorkflow, WorkflowOutcome, WorkflowStep};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub thread_id: String,
    pub sender: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOutcome {
    Collected,
    AwaitingDetails,
    Booked,
    Updated,
    Failed,
    NotUnderstood,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyError {
    pub kind: &'static str,
    pub step: Option<WorkflowStep>,
    pub detail: String,
}

impl From<&WorkflowError> for ReplyError {
    fn from(e: &WorkflowError) -> Self {
        Self {
            kind: e.kind(),
            step: e.step(),
            detail: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub message_id: String,
    pub thread_id: String,
    pub reply: String,
    pub intent: Intent,
    pub state: GateState,
    pub outcome: ReplyOutcome,
    pub booking_id: Option<String>,
    pub error: Option<ReplyError>,
}

/// Handles one chat message end to end. Messages of the same thread are
/// processed one at a time; the session is saved once, after the reply is
/// decided.
pub async fn process_message(
    state: &Arc<AppState>,
    incoming: IncomingMessage,
) -> anyhow::Result<ChatReply> {
    let lock = state.thread_locks.for_thread(&incoming.thread_id);
    let _guard = lock.lock().await;

    let message_id = uuid::Uuid::new_v4().to_string();
    let now = incoming.timestamp.unwrap_or_else(|| state.clock.now());
    let today = now.date_naive();
    let history_limit = state.config.session_history_limit;

    let mut session = state
        .sessions
        .get(&incoming.thread_id)
        .await?
        .unwrap_or_else(|| ConversationSession::new(&incoming.thread_id, now));

    if session.gate == GateState::Executing {
        // Only reachable if a previous run died mid-workflow.
        tracing::warn!(thread_id = %session.thread_id, "session left executing, resetting");
        session.gate = GateState::ReadyToExecute;
    }

    record_event(
        state,
        &incoming.thread_id,
        "message",
        &format!("{}: {}", incoming.sender, incoming.text),
    );

    let context = ExtractionContext {
        history: &session.messages,
        sender: &incoming.sender,
        today,
        gate: session.gate,
        buffer: &session.buffer,
    };
    let classified = state.extractor.classify(&incoming.text, &context).await;

    session.push_message(
        "user",
        &format!("{}: {}", incoming.sender, incoming.text),
        history_limit,
    );

    let entities = match classified {
        Ok(entities) => entities,
        Err(e) => {
            // Treated as casual chat that changes nothing.
            tracing::warn!(thread_id = %session.thread_id, error = %e, "extraction failed");
            let err = WorkflowError::Extraction(e.to_string());
            let reply = err.user_message();
            return finish(
                state,
                session,
                now,
                Draft {
                    message_id,
                    intent: Intent::CasualConversation,
                    reply,
                    outcome: ReplyOutcome::NotUnderstood,
                    error: Some(ReplyError::from(&err)),
                },
            )
            .await;
        }
    };

    tracing::info!(
        thread_id = %session.thread_id,
        intent = entities.intent.as_str(),
        state = session.gate.as_str(),
        "processing message"
    );

    if names_other_customer(&session, &entities) {
        tracing::info!(thread_id = %session.thread_id, "different customer named, starting a new booking");
        session.buffer = BookingBuffer::default();
    }
    session.buffer.merge(&entities);
    session.last_intent = Some(entities.intent);

    let transition = gate::transition(
        session.gate,
        &GateEvent::Message {
            intent: entities.intent,
            has_customer: session.has_customer_reference(),
            has_pet: session.has_pet_reference(),
        },
    )?;
    session.gate = transition.to;

    let draft = match transition.action {
        GateAction::Execute => execute(state, &mut session, &entities, now, message_id).await?,
        GateAction::AwaitReferences(missing) => {
            let needed: Vec<String> = missing.iter().map(|m| m.to_string()).collect();
            Draft {
                message_id,
                intent: entities.intent,
                reply: format!(
                    "Great! Before I can book this I still need: {}.",
                    needed.join(" and ")
                ),
                outcome: ReplyOutcome::AwaitingDetails,
                error: None,
            }
        }
        GateAction::Collect | GateAction::None => Draft {
            message_id,
            intent: entities.intent,
            reply: entities
                .reply
                .clone()
                .unwrap_or_else(|| collecting_reply(&session)),
            outcome: ReplyOutcome::Collected,
            error: None,
        },
    };

    finish(state, session, now, draft).await
}

struct Draft {
    message_id: String,
    intent: Intent,
    reply: String,
    outcome: ReplyOutcome,
    error: Option<ReplyError>,
}

async fn execute(
    state: &Arc<AppState>,
    session: &mut ConversationSession,
    entities: &ExtractedEntities,
    now: DateTime<Utc>,
    message_id: String,
) -> anyhow::Result<Draft> {
    let plan = resolve(session, entities);
    tracing::info!(
        thread_id = %session.thread_id,
        remote_steps = plan.remote_steps(),
        update = matches!(plan.booking, BookingAction::Update { .. }),
        customer_changed = plan.customer_changed,
        "booking confirmed, running workflow"
    );

    session.gate = gate::transition(session.gate, &GateEvent::WorkflowStarted)?.to;
    record_event(state, &session.thread_id, "workflow_started", &message_id);

    let workflow = BookingWorkflow::new(
        state.api.as_ref(),
        &state.config.professional_id,
        state.config.retry,
    );
    let result = workflow.run(session, &plan, now.date_naive()).await;

    match result {
        Ok(outcome) => {
            session.gate = gate::transition(session.gate, &GateEvent::WorkflowSucceeded)?.to;
            let reply = booked_reply(session, &outcome);
            let kind = if outcome.updated {
                "booking_updated"
            } else {
                "booking_created"
            };
            record_event(state, &session.thread_id, kind, &outcome.booking_id);
            tracing::info!(
                thread_id = %session.thread_id,
                booking_id = %outcome.booking_id,
                updated = outcome.updated,
                "booking written"
            );
            Ok(Draft {
                message_id,
                intent: entities.intent,
                reply,
                outcome: if outcome.updated {
                    ReplyOutcome::Updated
                } else {
                    ReplyOutcome::Booked
                },
                error: None,
            })
        }
        Err(err) => {
            session.gate = gate::transition(session.gate, &GateEvent::WorkflowFailed)?.to;
            tracing::warn!(
                thread_id = %session.thread_id,
                kind = err.kind(),
                step = err.step().map(|s| s.as_str()),
                error = %err,
                "booking workflow failed"
            );
            record_event(state, &session.thread_id, "workflow_failed", &err.to_string());
            Ok(Draft {
                message_id,
                intent: entities.intent,
                reply: err.user_message(),
                outcome: ReplyOutcome::Failed,
                error: Some(ReplyError::from(&err)),
            })
        }
    }
}

async fn finish(
    state: &Arc<AppState>,
    mut session: ConversationSession,
    now: DateTime<Utc>,
    draft: Draft,
) -> anyhow::Result<ChatReply> {
    session.push_message(
        "assistant",
        &draft.reply,
        state.config.session_history_limit,
    );
    session.updated_at = now;
    state.sessions.put(&session).await?;

    record_event(state, &session.thread_id, "reply", &draft.reply);

    Ok(ChatReply {
        message_id: draft.message_id,
        thread_id: session.thread_id,
        reply: draft.reply,
        intent: draft.intent,
        state: session.gate,
        outcome: draft.outcome,
        booking_id: session.booking_id,
        error: draft.error,
    })
}

fn collecting_reply(session: &ConversationSession) -> String {
    let buffer = &session.buffer;
    let mut noted = Vec::new();
    if let Some(name) = buffer.customer_name.as_ref().or(session.customer_name.as_ref()) {
        noted.push(format!("customer {name}"));
    }
    if !buffer.pets.is_empty() {
        let names: Vec<&str> = buffer.pets.iter().map(|p| p.name.as_str()).collect();
        noted.push(format!("pets {}", names.join(", ")));
    }
    if let Some(service) = &buffer.service_name {
        noted.push(format!("service {service}"));
    }
    if let Some(dates) = &buffer.start_date_phrase {
        noted.push(format!("dates {dates}"));
    }

    if noted.is_empty() {
        "Got it.".to_string()
    } else {
        format!("Got it. So far I have {}.", noted.join("; "))
    }
}

fn booked_reply(session: &ConversationSession, outcome: &WorkflowOutcome) -> String {
    let pets: Vec<&str> = session.pets.iter().map(|p| p.name.as_str()).collect();
    let service = session
        .service
        .as_ref()
        .map(|s| s.service_name.as_str())
        .unwrap_or("booking");
    let when = session
        .date_range
        .map(|r| r.to_human_readable())
        .unwrap_or_default();
    let verb = if outcome.updated { "Updated" } else { "Booked" };
    format!(
        "{verb}: {service} for {} ({when}). Reference {}.",
        pets.join(" and "),
        outcome.booking_id
    )
}

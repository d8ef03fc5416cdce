//! Confirmation gate: nothing is written to the booking system until the pet
//! sitter confirms and the session knows who the customer and pets are.

use std::fmt;

use serde::Serialize;

use crate::models::{GateState, Intent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReference {
    Customer,
    Pet,
}

impl fmt::Display for MissingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingReference::Customer => write!(f, "customer name or contact"),
            MissingReference::Pet => write!(f, "at least one pet"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    Message {
        intent: Intent,
        has_customer: bool,
        has_pet: bool,
    },
    WorkflowStarted,
    WorkflowSucceeded,
    WorkflowFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateAction {
    /// Keep collecting details; no remote writes.
    Collect,
    /// A confirmation arrived before the references it needs.
    AwaitReferences(Vec<MissingReference>),
    Execute,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: GateState,
    pub to: GateState,
    pub action: GateAction,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("invalid gate transition from {} on {event:?}", state.as_str())]
    InvalidTransition { state: GateState, event: GateEvent },
}

pub fn transition(state: GateState, event: &GateEvent) -> Result<Transition, GateError> {
    use GateState::{Collecting, Completed, Executing, ReadyToExecute};

    let (to, action) = match (state, event) {
        (
            Collecting | ReadyToExecute | Completed,
            GateEvent::Message {
                intent,
                has_customer,
                has_pet,
            },
        ) => {
            if !intent.is_execute_signal() {
                (Collecting, GateAction::Collect)
            } else {
                let missing = missing_references(*has_customer, *has_pet);
                if missing.is_empty() {
                    (ReadyToExecute, GateAction::Execute)
                } else {
                    (Collecting, GateAction::AwaitReferences(missing))
                }
            }
        }
        (ReadyToExecute, GateEvent::WorkflowStarted) => (Executing, GateAction::None),
        (Executing, GateEvent::WorkflowSucceeded) => (Completed, GateAction::None),
        (Executing, GateEvent::WorkflowFailed) => (ReadyToExecute, GateAction::None),
        _ => {
            return Err(GateError::InvalidTransition {
                state,
                event: event.clone(),
            });
        }
    };

    Ok(Transition {
        from: state,
        to,
        action,
    })
}

pub fn missing_references(has_customer: bool, has_pet: bool) -> Vec<MissingReference> {
    let mut missing = Vec::new();
    if !has_customer {
        missing.push(MissingReference::Customer);
    }
    if !has_pet {
        missing.push(MissingReference::Pet);
    }
    missing
}

use std::sync::Arc;

use crate::db::events;
use crate::models::ActivityEvent;
use crate::state::AppState;

/// Stores an activity event and pushes it to live `/api/events` subscribers.
/// Failures are logged, never surfaced to the chat.
pub fn record_event(state: &Arc<AppState>, thread_id: &str, kind: &str, content: &str) {
    let inserted = match state.db.lock() {
        Ok(db) => events::insert_event(&db, thread_id, kind, content),
        Err(_) => Err(anyhow::anyhow!("activity database lock poisoned")),
    };

    match inserted {
        Ok(event) => {
            // No receivers is fine
            let _ = state.activity_tx.send(event);
        }
        Err(e) => {
            tracing::error!(error = %e, thread_id, kind, "failed to record activity event");
        }
    }
}

pub fn thread_events(
    state: &Arc<AppState>,
    thread_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<ActivityEvent>> {
    let db = state
        .db
        .lock()
        .map_err(|_| anyhow::anyhow!("activity database lock poisoned"))?;
    events::get_thread_events(&db, thread_id, limit)
}

pub fn events_since(state: &Arc<AppState>, since_id: i64) -> anyhow::Result<Vec<ActivityEvent>> {
    let db = state
        .db
        .lock()
        .map_err(|_| anyhow::anyhow!("activity database lock poisoned"))?;
    events::get_events_since(&db, since_id)
}

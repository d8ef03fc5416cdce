use serde::{Deserialize, Serialize};

/// One line of the activity feed pushed to `/api/events` subscribers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivityEvent {
    pub id: i64,
    pub thread_id: String,
    pub kind: String,
    pub content: String,
    pub created_at: String,
}

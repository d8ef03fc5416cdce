use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::db::SessionRepository;
use crate::models::ActivityEvent;
use crate::services::ai::intent::IntentExtractor;
use crate::services::api::ProfessionalsApi;
use crate::services::clock::Clock;

pub struct AppState {
    /// Activity log; also backs the sessions table when sessions are not in memory.
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub sessions: Arc<dyn SessionRepository>,
    pub extractor: Arc<dyn IntentExtractor>,
    pub api: Arc<dyn ProfessionalsApi>,
    pub clock: Arc<dyn Clock>,
    pub activity_tx: broadcast::Sender<ActivityEvent>,
    pub thread_locks: ThreadLocks,
}

/// One async mutex per chat thread so a thread's messages are processed
/// strictly one at a time while different threads run in parallel.
#[derive(Default)]
pub struct ThreadLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ThreadLocks {
    pub fn for_thread(&self, thread_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drops the lock entry unless a message for the thread is in flight.
    pub fn forget(&self, thread_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        if locks
            .get(thread_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(thread_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_thread_shares_lock() {
        let locks = ThreadLocks::default();
        let a = locks.for_thread("t-1");
        let b = locks.for_thread("t-1");
        let c = locks.for_thread("t-2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));

        locks.forget("t-1");
        assert!(Arc::ptr_eq(&a, &locks.for_thread("t-1")));

        let weak = Arc::downgrade(&a);
        drop((a, b));
        locks.forget("t-1");
        assert!(weak.upgrade().is_none());
    }
}

//! Per-test serialization.
//!
//! The sweep reconciles several tests at once and the queue worker may touch
//! the same test concurrently. Finalization for one test id must have a
//! single owner at a time; different tests never contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct TestLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `test_id`. Released when the guard drops.
    pub async fn lock(&self, test_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop entries nobody holds or waits on.
            locks.retain(|id, lock| *id == test_id || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(test_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of test ids currently tracked.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

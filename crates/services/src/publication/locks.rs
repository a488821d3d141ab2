use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-IP submission locks. Holding the guard from the cooldown check until
/// the insert commits serialises submissions from one address, so two posts
/// cannot both pass the same cooldown window.
#[derive(Debug, Default)]
pub struct SubmissionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SubmissionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, ip: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(ip.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// Drops entries nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

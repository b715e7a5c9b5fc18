use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-submission mutual exclusion inside one process.
///
/// Entries are created on demand and removed when the last holder or waiter
/// lets go, so the map only ever holds submissions currently being graded.
#[derive(Clone, Default)]
pub(crate) struct SubmissionLeases {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

pub(crate) struct SubmissionLease {
    submission_id: String,
    leases: SubmissionLeases,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SubmissionLeases {
    pub(crate) async fn acquire(&self, submission_id: &str) -> SubmissionLease {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(submission_id.to_string()).or_default().clone()
        };

        let guard = lock.lock_owned().await;

        SubmissionLease {
            submission_id: submission_id.to_string(),
            leases: self.clone(),
            guard: Some(guard),
        }
    }

    pub(crate) fn active(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for SubmissionLease {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut map = self.leases.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = map.get(&self.submission_id).is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            map.remove(&self.submission_id);
        }
    }
}

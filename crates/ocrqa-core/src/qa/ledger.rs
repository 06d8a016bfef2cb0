use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Question keys already emitted during one pipeline run, shared by every
/// chunk so that no question appears twice in a dataset.
#[derive(Debug, Default)]
pub struct QuestionLedger {
    seen: Mutex<HashSet<String>>,
}

impl QuestionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` and returns `true` if it was not seen before. The check
    /// and the insert happen under one lock.
    pub fn claim(&self, key: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.contains(key) {
            return false;
        }
        seen.insert(key.to_string())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

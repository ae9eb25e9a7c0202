use super::GenerationError;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Tracks which actions have a request in flight so a second request for the
/// same action is refused instead of queued.
#[derive(Clone, Debug, Default)]
pub struct BusyGate {
    active: Arc<Mutex<HashSet<&'static str>>>,
}

impl BusyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self, action: &'static str) -> Result<BusyGuard, GenerationError> {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !active.insert(action) {
            debug!(action, "Suppressed duplicate request");
            return Err(GenerationError::Busy(action));
        }
        Ok(BusyGuard {
            gate: self.clone(),
            action,
        })
    }

    pub fn is_busy(&self, action: &str) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(action))
            .unwrap_or(false)
    }
}

/// Releases its action when dropped.
#[derive(Debug)]
pub struct BusyGuard {
    gate: BusyGate,
    action: &'static str,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut active = self
            .gate
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(self.action);
    }
}

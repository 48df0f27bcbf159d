//! Per-connection freshness bookkeeping
//!
//! Two clocks per key. The trust window covers the last positive hash
//! comparison: while it is open, a resident schema is served without any
//! I/O. The recent-check window remembers the outcome of the last
//! comparison, positive or not, so a burst of reads does not re-ask the
//! database.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::key::ConnectionKey;

pub const TRUST_WINDOW: Duration = Duration::from_secs(60);
pub const RECENT_CHECK_WINDOW: Duration = Duration::from_secs(5);

#[derive(Default)]
struct ValidityState {
    validated_at: HashMap<ConnectionKey, Instant>,
    recent_checks: HashMap<ConnectionKey, (Instant, bool)>,
}

#[derive(Default)]
pub struct ValidityTracker {
    state: Mutex<ValidityState>,
}

impl ValidityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last positive comparison is inside the trust window
    pub fn is_trusted(&self, key: &ConnectionKey) -> bool {
        self.state
            .lock()
            .validated_at
            .get(key)
            .is_some_and(|at| at.elapsed() < TRUST_WINDOW)
    }

    /// Outcome of a comparison made inside the recent-check window
    pub fn recent_check(&self, key: &ConnectionKey) -> Option<bool> {
        self.state
            .lock()
            .recent_checks
            .get(key)
            .filter(|(at, _)| at.elapsed() < RECENT_CHECK_WINDOW)
            .map(|(_, valid)| *valid)
    }

    pub fn record_check(&self, key: &ConnectionKey, valid: bool) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.recent_checks.insert(key.clone(), (now, valid));
        if valid {
            state.validated_at.insert(key.clone(), now);
        }
    }

    /// Record that the resident schema was just loaded or confirmed
    pub fn mark_validated(&self, key: &ConnectionKey) {
        self.record_check(key, true);
    }

    pub fn forget(&self, key: &ConnectionKey) {
        let mut state = self.state.lock();
        state.validated_at.remove(key);
        state.recent_checks.remove(key);
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.validated_at.clear();
        state.recent_checks.clear();
    }
}

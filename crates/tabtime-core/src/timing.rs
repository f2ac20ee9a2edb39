//! The single timing slot and the clock it is measured against.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::context::ContextId;

// ============================================================================
// Timing Slot
// ============================================================================

/// The one interval currently being timed.
///
/// An enum rather than a pair of options: a slot with a context but no
/// start time (or the reverse) cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimingSlot {
    /// Nothing is being timed.
    #[default]
    Idle,

    /// `context_id` has been the timed context since `since`.
    Timing {
        context_id: ContextId,
        since: DateTime<Utc>,
    },
}

impl TimingSlot {
    pub fn start(context_id: ContextId, since: DateTime<Utc>) -> Self {
        Self::Timing { context_id, since }
    }

    /// Empties the slot, returning what it held.
    pub fn take(&mut self) -> TimingSlot {
        std::mem::take(self)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn context_id(&self) -> Option<ContextId> {
        match self {
            Self::Idle => None,
            Self::Timing { context_id, .. } => Some(*context_id),
        }
    }

    pub fn since(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Idle => None,
            Self::Timing { since, .. } => Some(*since),
        }
    }

    /// Serializable view for status reporting.
    pub fn view(&self, now: DateTime<Utc>) -> Option<TimingView> {
        match self {
            Self::Idle => None,
            Self::Timing { context_id, since } => Some(TimingView {
                context_id: *context_id,
                since: *since,
                elapsed_seconds: elapsed_seconds(*since, now).max(0),
            }),
        }
    }
}

/// Snapshot of a non-empty slot, as shown to UI clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingView {
    pub context_id: ContextId,
    pub since: DateTime<Utc>,
    pub elapsed_seconds: i64,
}

/// Whole seconds between `since` and `now`, rounded to nearest.
///
/// Negative when the clock went backwards; callers discard anything `<= 0`.
pub fn elapsed_seconds(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (now - since).num_milliseconds();
    (millis as f64 / 1000.0).round() as i64
}

// ============================================================================
// Clock
// ============================================================================

/// Source of "now" for the tracker.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

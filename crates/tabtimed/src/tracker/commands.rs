//! Tracker actor commands, results and errors.

use thiserror::Error;
use tokio::sync::oneshot;

use tabtime_core::{ContextId, LoadStatus, SiteKey, TimingSlot, TimingView, WindowId};

// ============================================================================
// Tracker Commands
// ============================================================================

/// Commands sent to the tracker actor.
///
/// Every event command answers with the [`Transition`] it caused, so callers
/// (and tests) know the event has been fully applied before sending the next.
#[derive(Debug)]
pub enum TrackerCommand {
    /// A context became the selected tab of its window.
    ContextActivated {
        context_id: ContextId,
        respond_to: oneshot::Sender<Transition>,
    },

    /// A context reported load progress.
    NavigationCompleted {
        context_id: ContextId,
        status: LoadStatus,
        respond_to: oneshot::Sender<Transition>,
    },

    /// A context was closed.
    ContextRemoved {
        context_id: ContextId,
        respond_to: oneshot::Sender<Transition>,
    },

    /// Focus left every browser window.
    FocusLost {
        respond_to: oneshot::Sender<Transition>,
    },

    /// A browser window gained focus.
    FocusGained {
        window_id: WindowId,
        respond_to: oneshot::Sender<Transition>,
    },

    /// Commit the open interval and keep timing the same context.
    Flush {
        respond_to: oneshot::Sender<Transition>,
    },

    /// Read the slot for status display.
    GetSlot {
        respond_to: oneshot::Sender<Option<TimingView>>,
    },
}

// ============================================================================
// Results
// ============================================================================

/// What processing one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Outcome of closing the previous interval, if one was open.
    pub commit: Option<CommitOutcome>,
    /// The slot after the event.
    pub slot: TimingSlot,
}

impl Transition {
    /// An event that changed nothing.
    pub fn unchanged(slot: TimingSlot) -> Self {
        Self { commit: None, slot }
    }

    /// Seconds written to the ledger by this event.
    pub fn committed_seconds(&self) -> u64 {
        match &self.commit {
            Some(CommitOutcome::Committed { seconds, .. }) => *seconds,
            _ => 0,
        }
    }
}

/// Result of closing one timing interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Elapsed time was added to the ledger.
    Committed {
        site: SiteKey,
        seconds: u64,
        /// Site total after the commit.
        total: u64,
    },

    /// Nothing was written, by policy.
    Discarded(DiscardReason),

    /// The ledger write failed. The interval is lost.
    Failed(String),
}

/// Why a closed interval was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Rounded elapsed time was zero or negative.
    NonPositive { elapsed: i64 },
    /// The context no longer exists, so its site cannot be resolved.
    ContextGone { context_id: ContextId },
    /// The context now shows a browser-internal or host-less page.
    Untrackable { context_id: ContextId },
}

impl std::fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositive { elapsed } => write!(f, "non-positive duration ({elapsed}s)"),
            Self::ContextGone { context_id } => write!(f, "context {context_id} no longer exists"),
            Self::Untrackable { context_id } => {
                write!(f, "context {context_id} shows an untrackable page")
            }
        }
    }
}

// ============================================================================
// Tracker Errors
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// The actor has shut down.
    #[error("tracker channel closed")]
    ChannelClosed,
}

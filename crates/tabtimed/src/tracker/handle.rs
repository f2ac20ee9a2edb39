//! Client interface for interacting with the TrackerActor.
//!
//! The `TrackerHandle` is the named-handler surface the host adapter binds
//! browser events to. It is cheap to clone.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `TrackerError::ChannelClosed`

use tokio::sync::{mpsc, oneshot};

use tabtime_core::{ContextId, LoadStatus, TimingView, WindowId};

use super::commands::{TrackerCommand, TrackerError, Transition};

/// Handle for interacting with the tracker actor.
#[derive(Clone)]
pub struct TrackerHandle {
    sender: mpsc::Sender<TrackerCommand>,
}

impl TrackerHandle {
    pub fn new(sender: mpsc::Sender<TrackerCommand>) -> Self {
        Self { sender }
    }

    /// A context became the selected tab of its window.
    ///
    /// # Errors
    ///
    /// - `TrackerError::ChannelClosed` if the actor has shut down
    pub async fn context_activated(&self, context_id: ContextId) -> Result<Transition, TrackerError> {
        self.request(|respond_to| TrackerCommand::ContextActivated {
            context_id,
            respond_to,
        })
        .await
    }

    /// A context reported load progress; only `Complete` in the selected
    /// tab on a trackable page causes a transition.
    pub async fn navigation_completed(
        &self,
        context_id: ContextId,
        status: LoadStatus,
    ) -> Result<Transition, TrackerError> {
        self.request(|respond_to| TrackerCommand::NavigationCompleted {
            context_id,
            status,
            respond_to,
        })
        .await
    }

    /// A context was closed.
    pub async fn context_removed(&self, context_id: ContextId) -> Result<Transition, TrackerError> {
        self.request(|respond_to| TrackerCommand::ContextRemoved {
            context_id,
            respond_to,
        })
        .await
    }

    /// Focus left the browser. Always leaves the tracker idle.
    pub async fn focus_lost(&self) -> Result<Transition, TrackerError> {
        self.request(|respond_to| TrackerCommand::FocusLost { respond_to })
            .await
    }

    /// A browser window gained focus.
    pub async fn focus_gained(&self, window_id: WindowId) -> Result<Transition, TrackerError> {
        self.request(|respond_to| TrackerCommand::FocusGained {
            window_id,
            respond_to,
        })
        .await
    }

    /// Commits in-flight time and keeps timing.
    pub async fn flush(&self) -> Result<Transition, TrackerError> {
        self.request(|respond_to| TrackerCommand::Flush { respond_to })
            .await
    }

    /// Current slot, or `None` when idle or when the actor is gone.
    pub async fn current(&self) -> Option<TimingView> {
        self.request(|respond_to| TrackerCommand::GetSlot { respond_to })
            .await
            .ok()
            .flatten()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> TrackerCommand,
    ) -> Result<T, TrackerError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(make(tx))
            .await
            .map_err(|_| TrackerError::ChannelClosed)?;

        rx.await.map_err(|_| TrackerError::ChannelClosed)
    }
}

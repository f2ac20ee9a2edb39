//! Tracker actor - owns the timing slot and is the only ledger committer.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Reply channel send failures are ignored (the caller went away)

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tabtime_core::{elapsed_seconds, Clock, ContextId, LoadStatus, TimingSlot, WindowId};

use super::commands::{CommitOutcome, DiscardReason, TrackerCommand, Transition};
use crate::directory::BrowserHost;
use crate::store::LedgerStore;

/// The tracker actor.
///
/// Commands are processed one at a time, each run to completion (including
/// its ledger write) before the next is received. That ordering is what
/// guarantees one open interval at most and one commit per interval.
pub struct TrackerActor {
    receiver: mpsc::Receiver<TrackerCommand>,
    slot: TimingSlot,
    host: Arc<dyn BrowserHost>,
    ledger: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl TrackerActor {
    /// Creates an actor with an empty slot.
    pub fn new(
        receiver: mpsc::Receiver<TrackerCommand>,
        host: Arc<dyn BrowserHost>,
        ledger: Arc<LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            receiver,
            slot: TimingSlot::Idle,
            host,
            ledger,
            clock,
        }
    }

    /// Runs until every handle is dropped, then closes the open interval.
    pub async fn run(mut self) {
        info!("Tracker actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        let now = self.clock.now();
        if let Some(outcome) = self.close_slot(now).await {
            info!(outcome = ?outcome, "Final interval closed on shutdown");
        }
        info!("Tracker actor stopped");
    }

    async fn handle_command(&mut self, cmd: TrackerCommand) {
        let now = self.clock.now();

        match cmd {
            TrackerCommand::ContextActivated {
                context_id,
                respond_to,
            } => {
                let result = self.handle_activated(context_id, now).await;
                let _ = respond_to.send(result);
            }
            TrackerCommand::NavigationCompleted {
                context_id,
                status,
                respond_to,
            } => {
                let result = self.handle_navigation(context_id, status, now).await;
                let _ = respond_to.send(result);
            }
            TrackerCommand::ContextRemoved {
                context_id,
                respond_to,
            } => {
                let result = self.handle_removed(context_id, now).await;
                let _ = respond_to.send(result);
            }
            TrackerCommand::FocusLost { respond_to } => {
                let result = self.handle_focus_lost(now).await;
                let _ = respond_to.send(result);
            }
            TrackerCommand::FocusGained {
                window_id,
                respond_to,
            } => {
                let result = self.handle_focus_gained(window_id, now).await;
                let _ = respond_to.send(result);
            }
            TrackerCommand::Flush { respond_to } => {
                let result = self.handle_flush(now).await;
                let _ = respond_to.send(result);
            }
            TrackerCommand::GetSlot { respond_to } => {
                let _ = respond_to.send(self.slot.view(now));
            }
        }
    }

    // ========================================================================
    // Event Handlers
    // ========================================================================

    /// Closes the open interval and starts timing `context_id`, if it shows
    /// a trackable page. Otherwise the tracker goes idle.
    async fn handle_activated(&mut self, context_id: ContextId, now: DateTime<Utc>) -> Transition {
        let Ok(context_id) = context_id.ensure_valid() else {
            debug!(context_id = %context_id, "Ignoring activation of sentinel context");
            return Transition::unchanged(self.slot);
        };

        let commit = self.close_slot(now).await;

        match self.host.resolve(context_id).await {
            Some(context) if context.is_trackable() => {
                self.slot = TimingSlot::start(context_id, now);
                debug!(context_id = %context_id, url = %context.url, "Timing context");
            }
            Some(context) => {
                debug!(context_id = %context_id, url = %context.url, "Internal page, tracker idle");
            }
            None => {
                debug!(context_id = %context_id, "Activated context is unknown, tracker idle");
            }
        }

        Transition {
            commit,
            slot: self.slot,
        }
    }

    /// A finished load in the selected tab counts as a fresh activation.
    async fn handle_navigation(
        &mut self,
        context_id: ContextId,
        status: LoadStatus,
        now: DateTime<Utc>,
    ) -> Transition {
        if status != LoadStatus::Complete {
            return Transition::unchanged(self.slot);
        }

        let qualifies = match self.host.resolve(context_id).await {
            Some(context) => context.active && context.is_trackable(),
            None => false,
        };
        if !qualifies {
            debug!(context_id = %context_id, "Navigation ignored (background or internal page)");
            return Transition::unchanged(self.slot);
        }

        self.handle_activated(context_id, now).await
    }

    /// Only the timed context's removal matters; others are ignored.
    async fn handle_removed(&mut self, context_id: ContextId, now: DateTime<Utc>) -> Transition {
        if self.slot.context_id() != Some(context_id) {
            return Transition::unchanged(self.slot);
        }

        let commit = self.close_slot(now).await;
        Transition {
            commit,
            slot: self.slot,
        }
    }

    async fn handle_focus_lost(&mut self, now: DateTime<Utc>) -> Transition {
        let commit = self.close_slot(now).await;
        Transition {
            commit,
            slot: self.slot,
        }
    }

    async fn handle_focus_gained(&mut self, window_id: WindowId, now: DateTime<Utc>) -> Transition {
        if !window_id.is_valid() {
            return self.handle_focus_lost(now).await;
        }

        match self.host.active_in_window(window_id).await {
            Some(context) => self.handle_activated(context.id, now).await,
            None => {
                debug!(window_id = %window_id, "Focused window has no active context");
                Transition::unchanged(self.slot)
            }
        }
    }

    /// Commits in-flight time without pausing.
    ///
    /// The same context is re-entered from where the committed whole seconds
    /// end rather than from `now`, so the rounding remainder carries into the
    /// next interval. Repeated flushes add up to the same total as one commit.
    async fn handle_flush(&mut self, now: DateTime<Utc>) -> Transition {
        let TimingSlot::Timing { context_id, since } = self.slot else {
            return Transition::unchanged(self.slot);
        };
        let committed = elapsed_seconds(since, now).max(0);

        let transition = self.handle_activated(context_id, now).await;
        if self.slot.context_id() != Some(context_id) {
            return transition;
        }

        self.slot = TimingSlot::start(context_id, since + Duration::seconds(committed));
        Transition {
            commit: transition.commit,
            slot: self.slot,
        }
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Empties the slot and commits what it held.
    ///
    /// The slot is cleared before the write and stays cleared whatever the
    /// write's outcome: a stuck slot would inflate the next interval.
    async fn close_slot(&mut self, now: DateTime<Utc>) -> Option<CommitOutcome> {
        match self.slot.take() {
            TimingSlot::Idle => None,
            TimingSlot::Timing { context_id, since } => {
                Some(self.commit(context_id, since, now).await)
            }
        }
    }

    async fn commit(
        &self,
        context_id: ContextId,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CommitOutcome {
        let elapsed = elapsed_seconds(since, now);
        if elapsed <= 0 {
            return CommitOutcome::Discarded(DiscardReason::NonPositive { elapsed });
        }

        // Re-resolve rather than trust what the context showed when timing
        // started; a closed context loses its interval.
        let Some(context) = self.host.resolve(context_id).await else {
            warn!(
                context_id = %context_id,
                seconds = elapsed,
                "Context vanished before commit, dropping interval"
            );
            return CommitOutcome::Discarded(DiscardReason::ContextGone { context_id });
        };

        let site = match context.trackable_site() {
            Ok(site) => site,
            Err(e) => {
                debug!(context_id = %context_id, error = %e, "Not committing internal page");
                return CommitOutcome::Discarded(DiscardReason::Untrackable { context_id });
            }
        };

        let title = context.display_title(&site);
        let seconds = elapsed.unsigned_abs();

        match self.ledger.commit(site.clone(), title, seconds).await {
            Ok(total) => {
                debug!(site = %site, seconds, total, "Interval committed");
                CommitOutcome::Committed {
                    site,
                    seconds,
                    total,
                }
            }
            Err(e) => {
                warn!(site = %site, seconds, error = %e, "Ledger write failed, interval lost");
                CommitOutcome::Failed(e.to_string())
            }
        }
    }
}

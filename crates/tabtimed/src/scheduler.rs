//! Periodic drain of the ledger to the backend.
//!
//! One tick:
//! 1. read the session; without a token the round is skipped outright
//! 2. flush the tracker so in-flight time is included
//! 3. snapshot the ledger
//! 4. sync every site concurrently, each independently succeeding or failing
//! 5. settle only the sites the backend accepted, against the ledger as it
//!    is after the round rather than the snapshot; a reset during the round
//!    leaves nothing to settle
//!
//! Failed sites stay in the ledger and are retried on the next tick, with no
//! cap. Ticks never overlap.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tabtime_core::SyncedSite;

use crate::backend::Backend;
use crate::store::{LedgerStore, SessionStore, SyncSnapshot};
use crate::tracker::TrackerHandle;

/// Default period between ticks.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Why a tick did not sync anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No usable token in the session.
    NoSession,
    /// The previous tick is still draining.
    InFlight,
    /// Session or ledger could not be read.
    StorageUnavailable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSession => write!(f, "not signed in"),
            Self::InFlight => write!(f, "previous sync still running"),
            Self::StorageUnavailable => write!(f, "local storage unavailable"),
        }
    }
}

/// Summary of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Sites dispatched.
    pub attempted: usize,
    /// Sites the backend accepted.
    pub synced: usize,
    /// Sites left in the ledger for the next tick.
    pub failed: usize,
    pub skipped: Option<SkipReason>,
}

impl TickReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }
}

pub struct SyncScheduler {
    tracker: TrackerHandle,
    ledger: Arc<LedgerStore>,
    sessions: Arc<SessionStore>,
    backend: Arc<dyn Backend>,
    tick_lock: Mutex<()>,
}

impl SyncScheduler {
    pub fn new(
        tracker: TrackerHandle,
        ledger: Arc<LedgerStore>,
        sessions: Arc<SessionStore>,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            tracker,
            ledger,
            sessions,
            backend,
            tick_lock: Mutex::new(()),
        }
    }

    /// Runs one tick now. Returns immediately if another tick is in flight.
    pub async fn run_tick(&self) -> TickReport {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            debug!("Sync tick skipped, previous tick in flight");
            return TickReport::skipped(SkipReason::InFlight);
        };

        let session = match self.sessions.load().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Could not read session, skipping sync");
                return TickReport::skipped(SkipReason::StorageUnavailable);
            }
        };
        let Some(token) = session.usable_token().cloned() else {
            debug!("Not signed in, skipping sync");
            return TickReport::skipped(SkipReason::NoSession);
        };

        if let Err(e) = self.tracker.flush().await {
            warn!(error = %e, "Could not flush tracker before sync");
        }

        let SyncSnapshot {
            ledger: snapshot,
            generation,
        } = match self.ledger.snapshot_for_sync().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Could not read ledger, skipping sync");
                return TickReport::skipped(SkipReason::StorageUnavailable);
            }
        };

        let mut report = TickReport {
            attempted: snapshot.len(),
            ..TickReport::default()
        };
        if snapshot.is_empty() {
            return report;
        }

        let mut dispatches = JoinSet::new();
        for (key, entry) in snapshot.iter() {
            let backend = Arc::clone(&self.backend);
            let token = token.clone();
            let key = key.clone();
            let title = entry.display_title.clone();
            let seconds = entry.accumulated_seconds;

            dispatches.spawn(async move {
                let result = backend.sync_site(&key, &title, seconds, &token).await;
                (key, seconds, result)
            });
        }

        let mut synced = Vec::with_capacity(snapshot.len());
        while let Some(joined) = dispatches.join_next().await {
            match joined {
                Ok((key, seconds, Ok(()))) => synced.push(SyncedSite { key, seconds }),
                Ok((key, seconds, Err(e))) => {
                    warn!(site = %key, seconds, error = %e, "Site sync failed, will retry");
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Sync dispatch task failed");
                    report.failed += 1;
                }
            }
        }
        report.synced = synced.len();

        match self.ledger.settle(generation, &synced).await {
            Ok(summary) => {
                debug!(
                    removed = summary.removed,
                    carried_over = summary.carried_over,
                    "Ledger settled"
                );
            }
            Err(e) => {
                // Entries stay; the backend will see the same totals again.
                warn!(error = %e, "Synced sites could not be pruned from ledger");
            }
        }

        report
    }

    /// Spawns the recurring tick loop. The first tick fires one `period`
    /// after start.
    pub fn spawn(self: Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Sync scheduler stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = self.run_tick().await;
                        if report.attempted > 0 {
                            info!(
                                attempted = report.attempted,
                                synced = report.synced,
                                failed = report.failed,
                                "Sync tick complete"
                            );
                        } else {
                            debug!(skipped = ?report.skipped, "Sync tick had nothing to send");
                        }
                    }
                }
            }
        })
    }
}

//! Tab activity tracker using the Actor pattern.
//!
//! The tracker owns the single timing slot. Browser lifecycle events arrive
//! as commands; each one closes the open interval (committing it to the
//! ledger) before the slot moves on.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ Extension shim  │────▶│  TrackerActor   │────▶│   LedgerStore   │
//! └─────────────────┘     └────────┬────────┘     └─────────────────┘
//!         │                        │
//!         │  TrackerCommand        │ resolve(id)
//!         │  (mpsc channel)        ▼
//!         ▼                ┌─────────────────┐
//!   Idle ⇄ Timing(id, t)   │   BrowserHost   │
//!                          └─────────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;

use tabtime_core::Clock;

use crate::directory::BrowserHost;
use crate::store::LedgerStore;

mod actor;
mod commands;
mod handle;

pub use actor::TrackerActor;
pub use commands::{CommitOutcome, DiscardReason, TrackerCommand, TrackerError, Transition};
pub use handle::TrackerHandle;

/// Channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawns the tracker actor on the current runtime and returns its handle.
///
/// The actor stops, closing any open interval, once every handle is dropped.
pub fn spawn_tracker(
    host: Arc<dyn BrowserHost>,
    ledger: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
) -> TrackerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = TrackerActor::new(cmd_rx, host, ledger, clock);
    tokio::spawn(actor.run());

    TrackerHandle::new(cmd_tx)
}

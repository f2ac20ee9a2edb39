//! tabtime core - shared types for per-site active time accounting
//!
//! This crate provides the domain types shared between the daemon
//! (tabtimed) and the wire protocol (tabtime-protocol).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod context;
pub mod error;
pub mod ledger;
pub mod session;
pub mod site;
pub mod timing;

// Re-exports for convenience
pub use context::{BrowsingContext, ContextId, LoadStatus, WindowId};
pub use error::{DomainError, DomainResult};
pub use ledger::{format_duration, Ledger, LedgerEntry, SettleSummary, SyncedSite};
pub use session::{AuthToken, Session};
pub use site::{is_internal_url, site_key_for, SiteKey, INTERNAL_SCHEMES};
pub use timing::{elapsed_seconds, Clock, ManualClock, SystemClock, TimingSlot, TimingView};

//! tabtime protocol - wire formats
//!
//! Message types for the extension shim ↔ daemon socket, and the JSON
//! bodies the daemon exchanges with the remote backend.

pub mod backend;
pub mod message;
pub mod version;

pub use backend::{AuthOutcome, AuthResponse, Credentials, TrackRequest};
pub use message::{ClientMessage, DaemonMessage, LedgerLine, MessageType, StatusReport};
pub use version::{ProtocolVersion, VersionError};

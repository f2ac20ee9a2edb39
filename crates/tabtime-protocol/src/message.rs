//! Protocol message types for daemon communication.
//!
//! Clients are the browser extension's shim (lifecycle events) and its popup
//! (login, register, status). Both speak newline-delimited JSON.

use crate::backend::{AuthOutcome, Credentials};
use crate::version::ProtocolVersion;
use serde::{Deserialize, Serialize};
use tabtime_core::{BrowsingContext, ContextId, Ledger, LoadStatus, TimingView, WindowId};

/// Message types that can be sent by clients to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageType {
    /// Client handshake/connection request
    Connect {
        /// Client identifier (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },

    /// A tab became the selected tab of its window
    ContextActivated { context: BrowsingContext },

    /// A tab's URL or title changed without it being (re)activated
    ContextUpdated { context: BrowsingContext },

    /// A tab finished (or progressed) loading a page
    NavigationCompleted {
        context: BrowsingContext,
        #[serde(default)]
        status: LoadStatus,
    },

    /// A tab was closed
    ContextRemoved { context_id: ContextId },

    /// Every browser window lost focus
    FocusLost,

    /// A browser window gained focus
    FocusGained { window_id: WindowId },

    /// Sign in and store the session
    Login(Credentials),

    /// Create an account
    Register(Credentials),

    /// Forget the stored session
    Logout,

    /// Request signed-in user, timing slot and unsynced ledger
    GetStatus,

    /// Run a sync round now instead of waiting for the next tick
    SyncNow,

    /// Discard all unsynced time
    ResetLedger,

    /// Ping to check connection
    Ping {
        /// Sequence number for matching pong response
        seq: u64,
    },

    /// Client disconnecting gracefully
    Disconnect,
}

/// Messages sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Protocol version
    pub protocol_version: ProtocolVersion,

    /// Message payload
    #[serde(flatten)]
    pub message: MessageType,
}

impl ClientMessage {
    /// Creates a new client message with current protocol version.
    pub fn new(message: MessageType) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            message,
        }
    }

    pub fn connect(client_id: Option<String>) -> Self {
        Self::new(MessageType::Connect { client_id })
    }

    pub fn context_activated(context: BrowsingContext) -> Self {
        Self::new(MessageType::ContextActivated { context })
    }

    pub fn context_updated(context: BrowsingContext) -> Self {
        Self::new(MessageType::ContextUpdated { context })
    }

    pub fn navigation_completed(context: BrowsingContext, status: LoadStatus) -> Self {
        Self::new(MessageType::NavigationCompleted { context, status })
    }

    pub fn context_removed(context_id: ContextId) -> Self {
        Self::new(MessageType::ContextRemoved { context_id })
    }

    pub fn focus_lost() -> Self {
        Self::new(MessageType::FocusLost)
    }

    pub fn focus_gained(window_id: WindowId) -> Self {
        Self::new(MessageType::FocusGained { window_id })
    }

    pub fn login(username: &str, password: &str) -> Self {
        Self::new(MessageType::Login(Credentials::new(username, password)))
    }

    pub fn register(username: &str, password: &str) -> Self {
        Self::new(MessageType::Register(Credentials::new(username, password)))
    }

    pub fn logout() -> Self {
        Self::new(MessageType::Logout)
    }

    pub fn get_status() -> Self {
        Self::new(MessageType::GetStatus)
    }

    pub fn sync_now() -> Self {
        Self::new(MessageType::SyncNow)
    }

    pub fn reset_ledger() -> Self {
        Self::new(MessageType::ResetLedger)
    }

    pub fn ping(seq: u64) -> Self {
        Self::new(MessageType::Ping { seq })
    }

    pub fn disconnect() -> Self {
        Self::new(MessageType::Disconnect)
    }
}

/// One unsynced ledger row, as rendered by the popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub site: String,
    pub title: String,
    pub seconds: u64,
}

/// Everything the popup needs to render its status view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub signed_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingView>,
    pub ledger: Vec<LedgerLine>,
}

impl StatusReport {
    pub fn new(username: Option<String>, timing: Option<TimingView>, ledger: &Ledger) -> Self {
        Self {
            signed_in: username.is_some(),
            username,
            timing,
            ledger: ledger
                .iter()
                .map(|(key, entry)| LedgerLine {
                    site: key.to_string(),
                    title: entry.display_title.clone(),
                    seconds: entry.accumulated_seconds,
                })
                .collect(),
        }
    }

    /// Total unsynced seconds across all sites.
    pub fn pending_seconds(&self) -> u64 {
        self.ledger.iter().map(|l| l.seconds).sum()
    }
}

/// Messages sent from daemon to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Connection accepted
    Connected {
        /// Daemon's protocol version
        protocol_version: ProtocolVersion,
        /// Assigned client ID
        client_id: String,
    },

    /// Connection rejected (version mismatch, etc.)
    Rejected {
        /// Reason for rejection
        reason: String,
        /// Daemon's protocol version (for client to upgrade)
        protocol_version: ProtocolVersion,
    },

    /// Event or command processed
    Ack,

    /// Answer to login/register
    AuthResult { outcome: AuthOutcome },

    /// Answer to get_status
    Status { status: StatusReport },

    /// Answer to sync_now
    SyncReport {
        attempted: usize,
        synced: usize,
        failed: usize,
        /// Why the round did not run, if it did not
        #[serde(skip_serializing_if = "Option::is_none")]
        skipped: Option<String>,
    },

    /// Pong response to ping
    Pong {
        /// Sequence number from ping
        seq: u64,
    },

    /// Error response
    Error {
        /// Error message
        message: String,
        /// Error code (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl DaemonMessage {
    pub fn connected(client_id: String) -> Self {
        Self::Connected {
            protocol_version: ProtocolVersion::CURRENT,
            client_id,
        }
    }

    pub fn rejected(reason: &str) -> Self {
        Self::Rejected {
            reason: reason.to_string(),
            protocol_version: ProtocolVersion::CURRENT,
        }
    }

    pub fn auth_result(outcome: AuthOutcome) -> Self {
        Self::AuthResult { outcome }
    }

    pub fn status(status: StatusReport) -> Self {
        Self::Status { status }
    }

    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: None,
        }
    }

    pub fn error_with_code(message: &str, code: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: Some(code.to_string()),
        }
    }
}

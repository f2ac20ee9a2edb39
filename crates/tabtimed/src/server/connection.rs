//! Connection handler for individual client connections.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Performs protocol version negotiation
//! - Parses incoming messages
//! - Mirrors tab snapshots into the directory, then hands the event to the tracker
//! - Answers popup requests (auth, status, sync)
//!
//! Browser events are applied in the order they arrive on a connection; the
//! reply to one is written before the next line is read.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use tabtime_protocol::{ClientMessage, DaemonMessage, MessageType, ProtocolVersion, StatusReport};

use super::DaemonServices;
use crate::tracker::TrackerError;

/// Maximum message size (1 MB)
const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Read timeout for idle connections (5 minutes)
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection handler for a single client.
pub struct ConnectionHandler {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    services: DaemonServices,
    /// Assigned after handshake
    client_id: Option<String>,
    connection_number: u64,
}

impl ConnectionHandler {
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        services: DaemonServices,
        connection_number: u64,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            services,
            client_id: None,
            connection_number,
        }
    }

    /// Performs the handshake, then processes messages until the client
    /// goes away. Returns the client id, if the handshake succeeded.
    pub async fn run(mut self) -> Option<String> {
        debug!(connection = self.connection_number, "New client connected");

        if let Err(e) = self.handle_handshake().await {
            warn!(
                connection = self.connection_number,
                error = %e,
                "Handshake failed"
            );
            return None;
        }
        info!(client_id = ?self.client_id, "Client handshake completed");

        if let Err(e) = self.process_messages().await {
            debug!(client_id = ?self.client_id, error = %e, "Connection closed");
        }

        info!(client_id = ?self.client_id, "Client disconnected");
        self.client_id
    }

    /// Expects a `Connect` message, validates the protocol version and
    /// responds with `Connected` or `Rejected`.
    async fn handle_handshake(&mut self) -> Result<(), ConnectionError> {
        let msg = timeout(READ_TIMEOUT, self.read_message())
            .await
            .map_err(|_| ConnectionError::Timeout)??;

        let client_version = msg.protocol_version;
        if !client_version.is_compatible_with(&ProtocolVersion::CURRENT) {
            warn!(
                client_version = %client_version,
                server_version = %ProtocolVersion::CURRENT,
                "Protocol version mismatch"
            );

            self.send_message(DaemonMessage::rejected(&format!(
                "Protocol version {} not compatible with daemon version {}",
                client_version,
                ProtocolVersion::CURRENT
            )))
            .await?;

            return Err(ConnectionError::VersionMismatch {
                client: client_version,
                server: ProtocolVersion::CURRENT,
            });
        }

        match msg.message {
            MessageType::Connect { client_id } => {
                let assigned_id =
                    client_id.unwrap_or_else(|| format!("client-{}", self.connection_number));
                self.client_id = Some(assigned_id.clone());
                self.send_message(DaemonMessage::connected(assigned_id)).await
            }
            other => {
                self.send_message(DaemonMessage::error("Expected connect message for handshake"))
                    .await?;
                Err(ConnectionError::UnexpectedMessage(format!("{other:?}")))
            }
        }
    }

    async fn process_messages(&mut self) -> Result<(), ConnectionError> {
        loop {
            let msg = match timeout(READ_TIMEOUT, self.read_message()).await {
                Ok(Ok(msg)) => msg,
                Ok(Err(ConnectionError::Eof)) => {
                    debug!(client_id = ?self.client_id, "Client sent EOF");
                    return Ok(());
                }
                Ok(Err(ConnectionError::ParseError(e))) => {
                    // A malformed line does not poison the connection
                    warn!(client_id = ?self.client_id, error = %e, "Unparseable message");
                    self.send_message(DaemonMessage::error_with_code(
                        &format!("Invalid message: {e}"),
                        "invalid_message",
                    ))
                    .await?;
                    continue;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    debug!(client_id = ?self.client_id, "Connection timed out");
                    return Err(ConnectionError::Timeout);
                }
            };

            if let Err(e) = self.handle_message(msg).await {
                if matches!(e, ConnectionError::Eof) {
                    return Ok(());
                }
                error!(client_id = ?self.client_id, error = %e, "Error handling message");

                self.send_message(DaemonMessage::error_with_code(&e.to_string(), e.code()))
                    .await?;
            }
        }
    }

    async fn handle_message(&mut self, msg: ClientMessage) -> Result<(), ConnectionError> {
        let services = &self.services;

        let reply = match msg.message {
            MessageType::Connect { .. } => DaemonMessage::error("Already connected"),

            MessageType::ContextActivated { context } => {
                let id = context.id;
                services.directory.activate(context).await;
                services.tracker.context_activated(id).await?;
                DaemonMessage::Ack
            }

            MessageType::ContextUpdated { context } => {
                services.directory.upsert(context).await;
                DaemonMessage::Ack
            }

            MessageType::NavigationCompleted { context, status } => {
                let id = context.id;
                services.directory.upsert(context).await;
                services.tracker.navigation_completed(id, status).await?;
                DaemonMessage::Ack
            }

            MessageType::ContextRemoved { context_id } => {
                // Forget first: a closed tab's open interval cannot be attributed
                services.directory.forget(context_id).await;
                services.tracker.context_removed(context_id).await?;
                DaemonMessage::Ack
            }

            MessageType::FocusLost => {
                services.tracker.focus_lost().await?;
                DaemonMessage::Ack
            }

            MessageType::FocusGained { window_id } => {
                services.tracker.focus_gained(window_id).await?;
                DaemonMessage::Ack
            }

            MessageType::Login(credentials) => {
                DaemonMessage::auth_result(services.gateway.login(&credentials).await)
            }

            MessageType::Register(credentials) => {
                DaemonMessage::auth_result(services.gateway.register(&credentials).await)
            }

            MessageType::Logout => DaemonMessage::auth_result(services.gateway.logout().await),

            MessageType::GetStatus => {
                let ledger = services
                    .ledger
                    .snapshot()
                    .await
                    .map_err(|e| ConnectionError::Storage(e.to_string()))?;
                let username = services.gateway.current_user().await;
                let timing = services.tracker.current().await;
                DaemonMessage::status(StatusReport::new(username, timing, &ledger))
            }

            MessageType::SyncNow => {
                debug!(client_id = ?self.client_id, "Sync requested");
                let report = services.scheduler.run_tick().await;
                DaemonMessage::SyncReport {
                    attempted: report.attempted,
                    synced: report.synced,
                    failed: report.failed,
                    skipped: report.skipped.map(|reason| reason.to_string()),
                }
            }

            MessageType::ResetLedger => {
                services
                    .ledger
                    .reset()
                    .await
                    .map_err(|e| ConnectionError::Storage(e.to_string()))?;
                info!(client_id = ?self.client_id, "Ledger reset");
                DaemonMessage::Ack
            }

            MessageType::Ping { seq } => DaemonMessage::pong(seq),

            MessageType::Disconnect => {
                debug!(client_id = ?self.client_id, "Client requested disconnect");
                return Err(ConnectionError::Eof);
            }
        };

        self.send_message(reply).await
    }

    async fn read_message(&mut self) -> Result<ClientMessage, ConnectionError> {
        let mut line = String::new();

        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if line.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::MessageTooLarge {
                size: line.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let msg: ClientMessage =
            serde_json::from_str(&line).map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        debug!(
            client_id = ?self.client_id,
            message_type = ?std::mem::discriminant(&msg.message),
            "Received message"
        );

        Ok(msg)
    }

    async fn send_message(&mut self, msg: DaemonMessage) -> Result<(), ConnectionError> {
        let json =
            serde_json::to_string(&msg).map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        let writer = &mut self.writer;
        match timeout(WRITE_TIMEOUT, async {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
            Err(_) => Err(ConnectionError::WriteTimeout),
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Protocol version mismatch: client {client}, daemon {server}")]
    VersionMismatch {
        client: ProtocolVersion,
        server: ProtocolVersion,
    },

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Read timeout")]
    Timeout,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Tracker unavailable: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ConnectionError {
    /// Machine-readable code sent alongside error replies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Tracker(_) => "tracker_unavailable",
            Self::Storage(_) => "storage",
            Self::ParseError(_) | Self::UnexpectedMessage(_) => "invalid_message",
            _ => "internal",
        }
    }
}

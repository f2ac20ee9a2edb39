//! Request/reply client for the daemon socket.
//!
//! Used by the `tabtimed` CLI (`status`, `sync`) and by anything else that
//! wants to talk to a running daemon: connect, handshake, then one reply per
//! request.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::debug;

use tabtime_protocol::{ClientMessage, DaemonMessage, ProtocolVersion};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Could not connect to daemon: {0}")]
    Connect(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Daemon closed the connection")]
    Closed,

    #[error("Daemon rejected connection: {reason} (daemon protocol {daemon_version})")]
    Rejected {
        reason: String,
        daemon_version: ProtocolVersion,
    },

    #[error("Unexpected reply: {0}")]
    Protocol(String),
}

pub struct DaemonClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    client_id: String,
}

impl DaemonClient {
    /// Connects and completes the handshake.
    pub async fn connect(socket_path: &Path, client_id: Option<String>) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(ClientError::Connect)?;
        let (reader, writer) = stream.into_split();

        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
            client_id: String::new(),
        };

        match client.request(&ClientMessage::connect(client_id)).await? {
            DaemonMessage::Connected {
                protocol_version,
                client_id,
            } => {
                if !ProtocolVersion::CURRENT.is_compatible_with(&protocol_version) {
                    return Err(ClientError::Rejected {
                        reason: "incompatible protocol".to_string(),
                        daemon_version: protocol_version,
                    });
                }
                debug!(client_id, "Handshake complete");
                client.client_id = client_id;
                Ok(client)
            }
            DaemonMessage::Rejected {
                reason,
                protocol_version,
            } => Err(ClientError::Rejected {
                reason,
                daemon_version: protocol_version,
            }),
            other => Err(ClientError::Protocol(format!("{other:?}"))),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Sends one message and waits for its reply.
    pub async fn request(&mut self, message: &ClientMessage) -> Result<DaemonMessage, ClientError> {
        let json = serde_json::to_string(message)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(ClientError::Closed);
        }
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Says goodbye. The daemon closes its end without replying.
    pub async fn disconnect(mut self) -> Result<(), ClientError> {
        let json = serde_json::to_string(&ClientMessage::disconnect())?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

//! HTTP client for the remote backend.
//!
//! Three endpoints: `POST /login`, `POST /register` and `POST /track`.
//! Every failure mode (transport, non-2xx, unreadable body) comes back as a
//! [`BackendError`]; nothing here panics or lets an error escape untyped.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use tabtime_core::{AuthToken, SiteKey};
use tabtime_protocol::{AuthResponse, Credentials, TrackRequest};

/// Default timeout for one backend request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Connection refused, DNS failure, timeout...
    #[error("request failed: {0}")]
    Transport(String),

    /// Backend answered with a non-success status.
    #[error("backend returned {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Rejected {
        status: StatusCode,
        message: Option<String>,
    },

    /// Response body could not be read or parsed.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl BackendError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Rejected { status, .. } => format!("Request failed ({status})"),
            Self::Transport(_) => "Could not reach the server".to_string(),
            Self::Decode(_) => "Unexpected response from the server".to_string(),
        }
    }
}

/// Operations the daemon needs from the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Reports one site's accumulated time. `Ok` means the backend accepted it.
    async fn sync_site(
        &self,
        site: &SiteKey,
        title: &str,
        total_seconds: u64,
        token: &AuthToken,
    ) -> Result<(), BackendError>;

    /// Issues a session for valid credentials.
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, BackendError>;

    /// Creates an account.
    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse, BackendError>;
}

/// [`Backend`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_credentials(
        &self,
        path: &str,
        credentials: &Credentials,
    ) -> Result<AuthResponse, BackendError> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .json(credentials)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = read_body(resp).await?;
        let parsed: Option<AuthResponse> = if body.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&body).ok()
        };

        if !status.is_success() {
            return Err(BackendError::Rejected {
                status,
                message: parsed
                    .as_ref()
                    .and_then(AuthResponse::error_text)
                    .map(str::to_string),
            });
        }

        parsed.ok_or_else(|| BackendError::Decode(format!("expected JSON from /{path}")))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn sync_site(
        &self,
        site: &SiteKey,
        title: &str,
        total_seconds: u64,
        token: &AuthToken,
    ) -> Result<(), BackendError> {
        let body = TrackRequest {
            website_url: site.to_string(),
            website_title: title.to_string(),
            total_time_seconds: total_seconds,
        };

        let resp = self
            .client
            .post(self.endpoint("track"))
            .bearer_auth(token.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = read_body(resp).await?;

        if !status.is_success() {
            return Err(BackendError::Rejected {
                status,
                message: None,
            });
        }

        // An empty acknowledgement is fine; anything else must be JSON.
        if !text.trim().is_empty() {
            serde_json::from_str::<serde_json::Value>(&text)
                .map_err(|e| BackendError::Decode(e.to_string()))?;
        }

        debug!(site = %site, total_seconds, "Site synced");
        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, BackendError> {
        self.post_credentials("login", credentials).await
    }

    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse, BackendError> {
        self.post_credentials("register", credentials).await
    }
}

async fn read_body(resp: Response) -> Result<String, BackendError> {
    resp.text()
        .await
        .map_err(|e| BackendError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let backend = HttpBackend::new("http://localhost:3000/", DEFAULT_REQUEST_TIMEOUT).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:3000");
        assert_eq!(backend.endpoint("track"), "http://localhost:3000/track");
    }

    #[test]
    fn test_rejected_display_includes_message() {
        let err = BackendError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            message: Some("Invalid credentials".to_string()),
        };
        assert_eq!(err.to_string(), "backend returned 401 Unauthorized: Invalid credentials");
        assert_eq!(err.user_message(), "Invalid credentials");

        let err = BackendError::Rejected {
            status: StatusCode::BAD_GATEWAY,
            message: None,
        };
        assert_eq!(err.to_string(), "backend returned 502 Bad Gateway");
    }

    #[test]
    fn test_transport_error_user_message() {
        let err = BackendError::Transport("connection refused".to_string());
        assert_eq!(err.user_message(), "Could not reach the server");
    }
}

//! JSON bodies exchanged with the remote backend.
//!
//! `POST /login` and `POST /register` take [`Credentials`] and answer with
//! an [`AuthResponse`]; `POST /track` takes a [`TrackRequest`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Username/password pair for login and registration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One site's accumulated time, as reported to `POST /track`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRequest {
    pub website_url: String,
    pub website_title: String,
    pub total_time_seconds: u64,
}

/// Backend reply to login/register.
///
/// Every field is optional: the backend sends `token` on success and
/// `error` (sometimes `message`) on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AuthResponse {
    /// Best human-readable failure text in the reply, if any.
    pub fn error_text(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Result of a login/register request as seen by the UI layer.
///
/// Serializes to either `{"success":true,...}` or `{"error":"..."}` so the
/// UI never has to tell an exception apart from an error reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthOutcome {
    Success {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    Failure {
        error: String,
    },
}

impl AuthOutcome {
    pub fn success(username: Option<String>) -> Self {
        Self::Success {
            success: true,
            username,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { success: true, .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure { error } => Some(error),
            Self::Success { .. } => None,
        }
    }
}

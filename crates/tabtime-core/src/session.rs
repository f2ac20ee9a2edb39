//! The signed-in user's session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bearer token issued by the backend on login.
///
/// `Debug` and `Display` never print the token itself.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(<redacted>)")
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted>")
    }
}

/// Persisted sign-in state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<AuthToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Session {
    pub fn signed_in(token: AuthToken, username: impl Into<String>) -> Self {
        Self {
            token: Some(token),
            username: Some(username.into()),
        }
    }

    /// The token, if one is present and non-blank.
    pub fn usable_token(&self) -> Option<&AuthToken> {
        self.token.as_ref().filter(|t| !t.is_blank())
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.usable_token().is_some()
    }
}

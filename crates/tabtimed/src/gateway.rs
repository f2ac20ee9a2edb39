//! Auth gateway: the login/register bridge between the popup and the backend.
//!
//! Results always come back as an [`AuthOutcome`]. A transport failure, an
//! error reply and a malformed reply all look the same to the caller: an
//! `{error: message}` value. Only a successful login touches the session.

use std::sync::Arc;

use tracing::{info, warn};

use tabtime_core::{AuthToken, Session};
use tabtime_protocol::{AuthOutcome, Credentials};

use crate::backend::Backend;
use crate::store::SessionStore;

#[derive(Clone)]
pub struct AuthGateway {
    backend: Arc<dyn Backend>,
    sessions: Arc<SessionStore>,
}

impl AuthGateway {
    pub fn new(backend: Arc<dyn Backend>, sessions: Arc<SessionStore>) -> Self {
        Self { backend, sessions }
    }

    /// Exchanges credentials for a token and stores the session.
    pub async fn login(&self, credentials: &Credentials) -> AuthOutcome {
        if let Some(problem) = validate(credentials) {
            return AuthOutcome::failure(problem);
        }

        let resp = match self.backend.login(credentials).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(username = %credentials.username, error = %e, "Login failed");
                return AuthOutcome::failure(e.user_message());
            }
        };

        let token = match resp.token.as_deref().map(AuthToken::new) {
            Some(token) if !token.is_blank() => token,
            _ => {
                let message = resp
                    .error_text()
                    .unwrap_or("Login response did not include a token")
                    .to_string();
                warn!(username = %credentials.username, error = %message, "Login rejected");
                return AuthOutcome::failure(message);
            }
        };

        let session = Session::signed_in(token, credentials.username.clone());
        if let Err(e) = self.sessions.save(&session).await {
            warn!(error = %e, "Could not persist session");
            return AuthOutcome::failure(format!("Could not save session: {e}"));
        }

        info!(username = %credentials.username, "Signed in");
        AuthOutcome::success(Some(credentials.username.clone()))
    }

    /// Creates an account. Does not sign in.
    pub async fn register(&self, credentials: &Credentials) -> AuthOutcome {
        if let Some(problem) = validate(credentials) {
            return AuthOutcome::failure(problem);
        }

        match self.backend.register(credentials).await {
            // A 2xx reply may carry a `message` on success; only `error` fails it
            Ok(resp) => match resp.error.as_deref().filter(|e| !e.trim().is_empty()) {
                Some(error) => AuthOutcome::failure(error),
                None => {
                    info!(username = %credentials.username, "Account registered");
                    AuthOutcome::success(Some(credentials.username.clone()))
                }
            },
            Err(e) => {
                warn!(username = %credentials.username, error = %e, "Registration failed");
                AuthOutcome::failure(e.user_message())
            }
        }
    }

    /// Forgets the stored session.
    pub async fn logout(&self) -> AuthOutcome {
        match self.sessions.clear().await {
            Ok(()) => {
                info!("Signed out");
                AuthOutcome::success(None)
            }
            Err(e) => AuthOutcome::failure(format!("Could not clear session: {e}")),
        }
    }

    /// Username of the signed-in user, if any. Never exposes the token.
    pub async fn current_user(&self) -> Option<String> {
        match self.sessions.load().await {
            Ok(session) if session.is_signed_in() => session.username,
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Could not read session");
                None
            }
        }
    }
}

fn validate(credentials: &Credentials) -> Option<&'static str> {
    if credentials.username.trim().is_empty() {
        Some("Username is required")
    } else if credentials.password.is_empty() {
        Some("Password is required")
    } else {
        None
    }
}

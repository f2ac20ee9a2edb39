//! Shared fixtures for the daemon integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tempfile::TempDir;

use tabtime_core::{AuthToken, BrowsingContext, Clock, ContextId, ManualClock, SiteKey, WindowId};
use tabtime_protocol::{AuthResponse, Credentials};
use tabtimed::backend::{Backend, BackendError};
use tabtimed::directory::ContextDirectory;
use tabtimed::store::{LedgerStore, SessionStore};
use tabtimed::tracker::{spawn_tracker, TrackerHandle};

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
}

pub fn tab(id: i64, window: i64, url: &str, title: &str) -> BrowsingContext {
    BrowsingContext::new(ContextId::new(id), WindowId::new(window), url, title)
}

/// A tracker wired to a real directory, a temp-dir ledger and a manual clock.
pub struct TrackerFixture {
    pub tracker: TrackerHandle,
    pub directory: ContextDirectory,
    pub ledger: Arc<LedgerStore>,
    pub sessions: Arc<SessionStore>,
    pub clock: ManualClock,
    pub dir: TempDir,
}

impl TrackerFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let ledger = Arc::new(LedgerStore::open(dir.path().join("ledger.json")));
        let sessions = Arc::new(SessionStore::open(dir.path().join("session.json")));
        let directory = ContextDirectory::new();
        let clock = ManualClock::new(t0());

        let tracker = spawn_tracker(
            Arc::new(directory.clone()),
            Arc::clone(&ledger),
            Arc::new(clock.clone()),
        );

        Self {
            tracker,
            directory,
            ledger,
            sessions,
            clock,
            dir,
        }
    }

    /// Mirrors what the server does for a `context_activated` message.
    pub async fn activate(&self, context: BrowsingContext) {
        let id = context.id;
        self.directory.activate(context).await;
        self.tracker.context_activated(id).await.expect("tracker alive");
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn seconds_for(&self, site: &str) -> u64 {
        self.ledger
            .snapshot()
            .await
            .expect("read ledger")
            .seconds_for(&SiteKey::new(site))
    }
}

/// One `/track` call as the fake backend saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackCall {
    pub site: String,
    pub title: String,
    pub seconds: u64,
    pub token: String,
}

/// In-process [`Backend`] with scripted failures.
#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<TrackCall>>,
    pub failing_sites: Mutex<HashSet<String>>,
    /// Delay before answering each `/track` call.
    pub delay: Option<Duration>,
    /// What `/login` answers; `None` means unreachable.
    pub login_reply: Mutex<Option<Result<AuthResponse, (StatusCode, Option<String>)>>>,
    pub login_calls: Mutex<usize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_site(&self, site: &str) {
        self.failing_sites.lock().unwrap().insert(site.to_string());
    }

    pub fn heal_site(&self, site: &str) {
        self.failing_sites.lock().unwrap().remove(site);
    }

    pub fn set_login_reply(&self, reply: Result<AuthResponse, (StatusCode, Option<String>)>) {
        *self.login_reply.lock().unwrap() = Some(reply);
    }

    pub fn calls(&self) -> Vec<TrackCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn sync_site(
        &self,
        site: &SiteKey,
        title: &str,
        total_seconds: u64,
        token: &AuthToken,
    ) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(TrackCall {
            site: site.to_string(),
            title: title.to_string(),
            seconds: total_seconds,
            token: token.expose().to_string(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_sites.lock().unwrap().contains(site.as_str()) {
            return Err(BackendError::Rejected {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: None,
            });
        }
        Ok(())
    }

    async fn login(&self, _credentials: &Credentials) -> Result<AuthResponse, BackendError> {
        *self.login_calls.lock().unwrap() += 1;
        match self.login_reply.lock().unwrap().clone() {
            Some(Ok(resp)) => Ok(resp),
            Some(Err((status, message))) => Err(BackendError::Rejected { status, message }),
            None => Err(BackendError::Transport("connection refused".to_string())),
        }
    }

    async fn register(&self, _credentials: &Credentials) -> Result<AuthResponse, BackendError> {
        Ok(AuthResponse::default())
    }
}

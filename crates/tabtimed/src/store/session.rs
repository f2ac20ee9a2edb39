//! The persisted session (bearer token + username).

use std::path::PathBuf;

use tokio::sync::Mutex;

use tabtime_core::Session;

use super::{JsonFile, StoreError};

/// Session file guarded by an async mutex.
///
/// Written only by the auth gateway; the scheduler only reads.
#[derive(Debug)]
pub struct SessionStore {
    file: JsonFile<Session>,
    lock: Mutex<()>,
}

impl SessionStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
            lock: Mutex::new(()),
        }
    }

    pub async fn load(&self) -> Result<Session, StoreError> {
        let _guard = self.lock.lock().await;
        self.file.read().await
    }

    pub async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.file.write(session.clone()).await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.save(&Session::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabtime_core::AuthToken;

    use crate::store::SESSION_FILE;

    #[tokio::test]
    async fn test_session_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);

        let store = SessionStore::open(&path);
        assert!(!store.load().await.unwrap().is_signed_in());

        store
            .save(&Session::signed_in(AuthToken::new("tok"), "ana"))
            .await
            .unwrap();

        let reopened = SessionStore::open(&path);
        let session = reopened.load().await.unwrap();
        assert_eq!(session.username.as_deref(), Some("ana"));
        assert_eq!(session.usable_token().map(AuthToken::expose), Some("tok"));

        reopened.clear().await.unwrap();
        assert_eq!(reopened.load().await.unwrap(), Session::default());
    }
}

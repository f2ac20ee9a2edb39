//! File-backed persistence for the ledger and the session.
//!
//! Each store is one JSON file rewritten whole on every change: write to a
//! temp file in the same directory, then rename over the original, so a
//! crash mid-write leaves the previous version intact.
//!
//! A missing, empty or corrupt file loads as the default value with a
//! warning. Losing unsynced time is preferable to refusing to start.
//!
//! File I/O runs on the blocking pool; callers hold the store's async mutex
//! across the whole read-modify-write.

mod ledger;
mod session;

pub use ledger::{Generation, LedgerStore, SyncSnapshot};
pub use session::SessionStore;

use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::warn;

/// File name of the ledger inside the state directory.
pub const LEDGER_FILE: &str = "ledger.json";

/// File name of the session inside the state directory.
pub const SESSION_FILE: &str = "session.json";

/// Errors raised while reading or writing a store file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Store path has no parent directory: {0}")]
    NoParent(PathBuf),

    #[error("Store I/O task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

/// A JSON document on disk holding one `T`.
#[derive(Debug)]
pub(crate) struct JsonFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonFile<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// [`load`](Self::load) on the blocking pool.
    pub(crate) async fn read(&self) -> Result<T, StoreError>
    where
        T: Send + 'static,
    {
        let file = self.clone();
        tokio::task::spawn_blocking(move || file.load()).await?
    }

    /// [`save`](Self::save) on the blocking pool.
    pub(crate) async fn write(&self, value: T) -> Result<(), StoreError>
    where
        T: Send + 'static,
    {
        let file = self.clone();
        tokio::task::spawn_blocking(move || file.save(&value)).await?
    }

    pub(crate) fn load(&self) -> Result<T, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(T::default());
        }

        match serde_json::from_str(&content) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Corrupt store file, starting empty"
                );
                Ok(T::default())
            }
        }
    }

    pub(crate) fn save(&self, value: &T) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(value)?;

        let parent = self
            .path
            .parent()
            .ok_or_else(|| StoreError::NoParent(self.path.clone()))?;
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
        temp.write_all(content.as_bytes()).map_err(write_err)?;
        temp.flush().map_err(write_err)?;
        temp.persist(&self.path).map_err(|e| write_err(e.error))?;

        Ok(())
    }
}

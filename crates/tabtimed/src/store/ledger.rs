//! The durable per-site ledger.

use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use tabtime_core::{Ledger, SettleSummary, SiteKey, SyncedSite};

use super::{JsonFile, StoreError};

/// Which ledger contents a snapshot was cut from. Every reset starts a new
/// generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// A ledger snapshot tagged with the generation it was read in.
#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    pub ledger: Ledger,
    pub generation: Generation,
}

/// The durable ledger.
///
/// Every mutation is a full read-modify-write of the file, serialized by an
/// async mutex. Tracker commits and scheduler settles both go through here,
/// so concurrent increments cannot overwrite each other.
#[derive(Debug)]
pub struct LedgerStore {
    file: JsonFile<Ledger>,
    /// Guards the file; holds the current generation.
    lock: Mutex<u64>,
}

impl LedgerStore {
    /// Opens (without reading) the ledger at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
            lock: Mutex::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Adds `seconds` to `key`. Returns the site's new total.
    pub async fn commit(
        &self,
        key: SiteKey,
        title: String,
        seconds: u64,
    ) -> Result<u64, StoreError> {
        let guard = self.lock.lock().await;
        self.update(guard, |ledger| ledger.commit(key, title, seconds))
            .await
    }

    /// Current contents.
    pub async fn snapshot(&self) -> Result<Ledger, StoreError> {
        let _guard = self.lock.lock().await;
        self.file.read().await
    }

    /// Current contents plus the generation to hand back to [`settle`](Self::settle).
    pub async fn snapshot_for_sync(&self) -> Result<SyncSnapshot, StoreError> {
        let guard = self.lock.lock().await;
        let ledger = self.file.read().await?;
        Ok(SyncSnapshot {
            ledger,
            generation: Generation(*guard),
        })
    }

    /// Drops the synced portion of each confirmed site, judged against the
    /// ledger as it is now rather than as it was when the round started.
    ///
    /// A no-op when the ledger was reset after `generation` was read: what
    /// it holds now was committed after the reset and never sent.
    pub async fn settle(
        &self,
        generation: Generation,
        synced: &[SyncedSite],
    ) -> Result<SettleSummary, StoreError> {
        if synced.is_empty() {
            return Ok(SettleSummary::default());
        }

        let guard = self.lock.lock().await;
        if *guard != generation.0 {
            debug!(
                sites = synced.len(),
                "Ledger was reset during sync, nothing to settle"
            );
            return Ok(SettleSummary::default());
        }
        self.update(guard, |ledger| ledger.settle(synced)).await
    }

    /// Discards all unsynced time.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut guard = self.lock.lock().await;
        *guard = guard.wrapping_add(1);
        self.update(guard, Ledger::reset).await
    }

    async fn update<R>(
        &self,
        _guard: MutexGuard<'_, u64>,
        f: impl FnOnce(&mut Ledger) -> R,
    ) -> Result<R, StoreError> {
        let mut ledger = self.file.read().await?;
        let result = f(&mut ledger);
        let sites = ledger.len();
        self.file.write(ledger).await?;

        debug!(
            path = %self.file.path().display(),
            sites,
            "Ledger written"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::LEDGER_FILE;

    #[tokio::test]
    async fn test_commit_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LEDGER_FILE);

        let store = LedgerStore::open(&path);
        store.commit(SiteKey::new("a.com"), "A".into(), 5).await.unwrap();
        store.commit(SiteKey::new("a.com"), "A2".into(), 7).await.unwrap();
        drop(store);

        let reopened = LedgerStore::open(&path);
        let ledger = reopened.snapshot().await.unwrap();
        let entry = ledger.get(&SiteKey::new("a.com")).unwrap();
        assert_eq!(entry.accumulated_seconds, 12);
        assert_eq!(entry.display_title, "A2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commits_do_not_lose_increments() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LedgerStore::open(dir.path().join(LEDGER_FILE)));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            tasks.spawn(async move {
                store.commit(SiteKey::new("race.com"), "Race".into(), 1).await
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap().unwrap();
        }

        let ledger = store.snapshot().await.unwrap();
        assert_eq!(ledger.seconds_for(&SiteKey::new("race.com")), 50);
    }

    #[tokio::test]
    async fn test_settle_after_reset_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::open(dir.path().join(LEDGER_FILE));
        store.commit(SiteKey::new("a.com"), "A".into(), 10).await.unwrap();

        let before = store.snapshot_for_sync().await.unwrap();
        store.reset().await.unwrap();
        store.commit(SiteKey::new("a.com"), "A".into(), 4).await.unwrap();

        let synced = [SyncedSite { key: SiteKey::new("a.com"), seconds: 10 }];
        let summary = store.settle(before.generation, &synced).await.unwrap();

        assert_eq!(summary, SettleSummary::default());
        let ledger = store.snapshot().await.unwrap();
        assert_eq!(ledger.seconds_for(&SiteKey::new("a.com")), 4);
    }

    #[tokio::test]
    async fn test_settle_in_same_generation_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::open(dir.path().join(LEDGER_FILE));
        store.commit(SiteKey::new("a.com"), "A".into(), 10).await.unwrap();

        let snapshot = store.snapshot_for_sync().await.unwrap();
        let synced = [SyncedSite { key: SiteKey::new("a.com"), seconds: 10 }];
        store.settle(snapshot.generation, &synced).await.unwrap();

        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::open(dir.path().join(LEDGER_FILE));
        store.commit(SiteKey::new("a.com"), "A".into(), 5).await.unwrap();

        store.reset().await.unwrap();

        assert!(store.snapshot().await.unwrap().is_empty());
    }
}

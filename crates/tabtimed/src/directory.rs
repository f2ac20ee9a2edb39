//! The daemon's view of the browser's tabs.
//!
//! The tracker never trusts a snapshot it cached when an interval started;
//! it re-resolves the context by id when the interval closes. `BrowserHost`
//! is that lookup. In the daemon it is answered by [`ContextDirectory`], a
//! mirror of the tab table kept current by the events the extension shim
//! forwards. Tests substitute their own host.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use tabtime_core::{BrowsingContext, ContextId, WindowId};

/// Read-only lookups into the browser's tab table.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Current snapshot of a context, or `None` if it no longer exists.
    async fn resolve(&self, id: ContextId) -> Option<BrowsingContext>;

    /// The selected tab of `window`, if the window has one.
    async fn active_in_window(&self, window: WindowId) -> Option<BrowsingContext>;
}

/// Mirror of the browser's tab table, fed by shim events.
///
/// Cheap to clone; clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct ContextDirectory {
    contexts: Arc<RwLock<HashMap<ContextId, BrowsingContext>>>,
}

impl ContextDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the latest snapshot of a context.
    ///
    /// An active snapshot demotes every other context in the same window,
    /// since a window has one selected tab.
    pub async fn upsert(&self, context: BrowsingContext) {
        if !context.id.is_valid() {
            return;
        }

        let mut contexts = self.contexts.write().await;
        if context.active {
            for other in contexts.values_mut() {
                if other.window_id == context.window_id && other.id != context.id {
                    other.active = false;
                }
            }
        }
        contexts.insert(context.id, context);
    }

    /// Records that `context` became the selected tab of its window.
    pub async fn activate(&self, context: BrowsingContext) {
        self.upsert(context.with_active(true)).await;
    }

    /// Forgets a closed context.
    pub async fn forget(&self, id: ContextId) -> Option<BrowsingContext> {
        let removed = self.contexts.write().await.remove(&id);
        if removed.is_some() {
            debug!(context_id = %id, "Context forgotten");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.contexts.read().await.is_empty()
    }
}

#[async_trait]
impl BrowserHost for ContextDirectory {
    async fn resolve(&self, id: ContextId) -> Option<BrowsingContext> {
        self.contexts.read().await.get(&id).cloned()
    }

    async fn active_in_window(&self, window: WindowId) -> Option<BrowsingContext> {
        if !window.is_valid() {
            return None;
        }
        self.contexts
            .read()
            .await
            .values()
            .find(|c| c.window_id == window && c.active)
            .cloned()
    }
}

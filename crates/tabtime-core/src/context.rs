//! Browsing context identifiers and snapshots.
//!
//! A browsing context is a single tab owned by the browser. The daemon only
//! ever holds read-only snapshots of one; the browser may destroy it at any
//! time without telling us first.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DomainError, DomainResult};
use crate::site::{site_key_for, SiteKey};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Identifier of a browsing context (tab).
///
/// Mirrors the browser's integer tab id. `ContextId::NONE` is the browser's
/// "no tab" sentinel and never names a real context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(i64);

impl ContextId {
    /// The browser's "no tab" sentinel.
    pub const NONE: ContextId = ContextId(-1);

    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns true unless this is the "no tab" sentinel.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }

    /// Rejects the "no tab" sentinel.
    pub fn ensure_valid(self) -> DomainResult<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(DomainError::InvalidContext { context_id: self })
        }
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ContextId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a browser window.
///
/// `WindowId::NONE` is what the browser reports when focus leaves every
/// browser window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(i64);

impl WindowId {
    /// The browser's "no window focused" sentinel.
    pub const NONE: WindowId = WindowId(-1);

    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for WindowId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Page load status reported alongside navigation events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Loading,
    #[default]
    Complete,
    /// Anything the browser reports that we do not model.
    #[serde(other)]
    Unknown,
}

/// Read-only snapshot of a browsing context at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsingContext {
    pub id: ContextId,
    pub window_id: WindowId,
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Whether this is the selected tab of its window.
    #[serde(default)]
    pub active: bool,
}

impl BrowsingContext {
    pub fn new(
        id: ContextId,
        window_id: WindowId,
        url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id,
            window_id,
            url: url.into(),
            title: title.into(),
            active: true,
        }
    }

    /// Returns a copy with the active flag set as given.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Site key of the page, or `None` for internal or host-less pages.
    pub fn site_key(&self) -> Option<SiteKey> {
        site_key_for(&self.url)
    }

    /// Site key of the page, or why there is none.
    pub fn trackable_site(&self) -> DomainResult<SiteKey> {
        self.site_key().ok_or_else(|| DomainError::UntrackableUrl {
            url: self.url.clone(),
        })
    }

    /// Returns true if time spent on this page may be recorded.
    #[must_use]
    pub fn is_trackable(&self) -> bool {
        self.site_key().is_some()
    }

    /// Title to record, falling back to the site key for untitled pages.
    pub fn display_title(&self, key: &SiteKey) -> String {
        let trimmed = self.title.trim();
        if trimmed.is_empty() {
            key.as_str().to_string()
        } else {
            trimmed.to_string()
        }
    }
}

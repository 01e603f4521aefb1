//! Shared response cache.
//!
//! # Responsibilities
//! - Remember the last valid response seen for each resource key
//! - Answer conditional GETs whose `If-Modified-Since` is not newer than the
//!   cached `Last-Modified`
//!
//! # Design Decisions
//! - `DashMap` gives every connection synchronized access without a global lock
//! - Last write wins; no TTL, no size bound, no eviction
//! - Entries are immutable once stored; an update is a full replacement
//! - Unparseable dates are a miss, never an error

use std::sync::Arc;

use dashmap::DashMap;

use crate::http::{HttpDate, Response};
use crate::observability::metrics;

/// Header carrying the entry's modification date.
pub const LAST_MODIFIED: &str = "Last-Modified";

/// A thread-safe map from resource key to the last response seen for it.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    inner: Arc<DashMap<String, Arc<Response>>>,
}

impl ResponseCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached response if the client's copy is still current.
    ///
    /// `client_known_since` is the raw `If-Modified-Since` value. A hit needs
    /// that value, an entry for `resource_key` carrying `Last-Modified`, and
    /// `client_known_since <= last_modified`.
    pub fn lookup(
        &self,
        resource_key: &str,
        client_known_since: Option<&str>,
    ) -> Option<Arc<Response>> {
        let known_since = client_known_since?;
        let entry = self.inner.get(resource_key)?.value().clone();
        let last_modified = entry.headers().get(LAST_MODIFIED)?;

        let (known_since, last_modified) =
            match (HttpDate::parse(known_since), HttpDate::parse(last_modified)) {
                (Ok(a), Ok(b)) => (a, b),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::debug!(resource_key, error = %e, "Unparseable freshness date");
                    return None;
                }
            };

        (known_since <= last_modified).then_some(entry)
    }

    /// Store `response` under `resource_key`, replacing any previous entry.
    pub fn store(&self, resource_key: impl Into<String>, response: Response) {
        self.inner.insert(resource_key.into(), Arc::new(response));
        metrics::record_cache_size(self.inner.len());
    }

    /// Entry for `resource_key`, regardless of freshness.
    pub fn get(&self, resource_key: &str) -> Option<Arc<Response>> {
        self.inner.get(resource_key).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
        metrics::record_cache_size(0);
    }
}

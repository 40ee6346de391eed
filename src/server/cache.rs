// src/server/cache.rs
//! Renamed-wheel result cache
//!
//! Content-addressed: the key is the upstream artifact's SHA-256 plus the
//! fingerprint of the rule that renamed it, so upstream content changes and
//! rule edits both miss. Bounded by entry count with FIFO eviction.
//!
//! Entries keep the rename warnings next to the bytes, so a hit reports the
//! same warnings as the download that filled it.

use crate::wheel::rename::RenameWarning;
use axum::body::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Cache key: (upstream sha256 hex, rule fingerprint)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub artifact_sha256: String,
    pub rule_fingerprint: String,
}

impl CacheKey {
    pub fn new(artifact_sha256: impl Into<String>, rule_fingerprint: impl Into<String>) -> Self {
        Self {
            artifact_sha256: artifact_sha256.into().to_lowercase(),
            rule_fingerprint: rule_fingerprint.into(),
        }
    }
}

/// A renamed wheel as produced by the engine
#[derive(Debug, Clone)]
pub struct CachedRename {
    pub filename: String,
    pub bytes: Bytes,
    pub warnings: Vec<RenameWarning>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, Arc<CachedRename>>,
    order: VecDeque<CacheKey>,
}

/// Bounded in-memory cache of renamed wheel bytes
pub struct RenameCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl RenameCache {
    /// Create a cache holding at most `capacity` wheels (0 disables it)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<CachedRename>> {
        if !self.is_enabled() {
            return None;
        }
        self.inner.lock().entries.get(key).cloned()
    }

    /// Store a result, evicting the oldest entries beyond capacity
    pub fn insert(&self, key: CacheKey, rename: Arc<CachedRename>) {
        if !self.is_enabled() {
            return;
        }

        let mut inner = self.inner.lock();
        if inner.entries.insert(key.clone(), rename).is_none() {
            inner.order.push_back(key);
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

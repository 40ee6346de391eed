// src/server/metrics.rs
//! Proxy counters
//!
//! Relaxed atomics only; exposed as JSON by `GET /admin/stats`.

use serde::Serialize;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Proxy metrics collector
#[derive(Default)]
pub struct ProxyMetrics {
    /// Project listings rendered (root and per project)
    listings: AtomicU64,
    /// Wheels renamed on the fly
    renames: AtomicU64,
    /// Warnings attached to those renames
    rename_warnings: AtomicU64,
    /// Renames that failed
    rename_failures: AtomicU64,
    /// Renamed wheels answered from the result cache
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    /// Downloads answered with a redirect to upstream
    redirects: AtomicU64,
    bytes_served: AtomicU64,
    upstream_fetches: AtomicU64,
    upstream_errors: AtomicU64,
    /// Successful configuration reloads
    reloads: AtomicU64,
    start_time: OnceLock<Instant>,
}

impl ProxyMetrics {
    pub fn new() -> Self {
        let metrics = Self::default();
        let _ = metrics.start_time.set(Instant::now());
        metrics
    }

    pub fn record_listing(&self) {
        self.listings.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed rename and how many warnings it produced
    pub fn record_rename(&self, warnings: usize) {
        self.renames.fetch_add(1, Ordering::Relaxed);
        self.rename_warnings.fetch_add(warnings as u64, Ordering::Relaxed);
    }

    pub fn record_rename_failure(&self) {
        self.rename_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_redirect(&self) {
        self.redirects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_served(&self, bytes: u64) {
        self.bytes_served.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_upstream_fetch(&self) {
        self.upstream_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_error(&self) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reload(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime = self
            .start_time
            .get()
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);

        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;
        let cache_hit_rate = if lookups > 0 {
            (cache_hits as f64 / lookups as f64) * 100.0
        } else {
            0.0
        };
        let bytes_served = self.bytes_served.load(Ordering::Relaxed);

        MetricsSnapshot {
            listings: self.listings.load(Ordering::Relaxed),
            renames: self.renames.load(Ordering::Relaxed),
            rename_warnings: self.rename_warnings.load(Ordering::Relaxed),
            rename_failures: self.rename_failures.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_rate,
            redirects: self.redirects.load(Ordering::Relaxed),
            bytes_served,
            bytes_served_human: human_bytes(bytes_served),
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            uptime_secs: uptime.as_secs(),
        }
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub listings: u64,
    pub renames: u64,
    pub rename_warnings: u64,
    pub rename_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Percentage of renamed downloads answered from cache
    pub cache_hit_rate: f64,
    pub redirects: u64,
    pub bytes_served: u64,
    pub bytes_served_human: String,
    pub upstream_fetches: u64,
    pub upstream_errors: u64,
    pub reloads: u64,
    pub uptime_secs: u64,
}

/// Format bytes as human-readable string
fn human_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

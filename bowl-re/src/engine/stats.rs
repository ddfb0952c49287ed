//! Engine counters reported on the health endpoint

use bowl_common::RecommendationSource;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Resolution outcome counters
#[derive(Debug, Default)]
pub struct EngineStats {
    primary_wins: AtomicU64,
    cached_fallbacks: AtomicU64,
    popular_fallbacks: AtomicU64,
    signature_fallbacks: AtomicU64,
    emergency_fallbacks: AtomicU64,
    late_primary_warmups: AtomicU64,
}

impl EngineStats {
    /// Count one resolution served from `source`
    pub fn record(&self, source: RecommendationSource) {
        let counter = match source {
            RecommendationSource::Ml => &self.primary_wins,
            RecommendationSource::Cached => &self.cached_fallbacks,
            RecommendationSource::Popular => &self.popular_fallbacks,
            RecommendationSource::Signature => &self.signature_fallbacks,
            RecommendationSource::Emergency => &self.emergency_fallbacks,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_late_warmup(&self) {
        self.late_primary_warmups.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of engine activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub in_flight: usize,
    pub coalesced: u64,
    pub primary_wins: u64,
    pub fallback_cached: u64,
    pub fallback_popular: u64,
    pub fallback_signature: u64,
    pub fallback_emergency: u64,
    pub late_primary_warmups: u64,
}

impl StatsSnapshot {
    /// Fill the outcome counters from `stats`; cache and dedup figures are set by the caller
    pub(crate) fn with_outcomes(mut self, stats: &EngineStats) -> Self {
        self.primary_wins = stats.primary_wins.load(Ordering::Relaxed);
        self.fallback_cached = stats.cached_fallbacks.load(Ordering::Relaxed);
        self.fallback_popular = stats.popular_fallbacks.load(Ordering::Relaxed);
        self.fallback_signature = stats.signature_fallbacks.load(Ordering::Relaxed);
        self.fallback_emergency = stats.emergency_fallbacks.load(Ordering::Relaxed);
        self.late_primary_warmups = stats.late_primary_warmups.load(Ordering::Relaxed);
        self
    }
}

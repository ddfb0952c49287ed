//! Request Coordinator
//!
//! Entry point of the engine. For each request:
//!
//! ```text
//! Idle ─► cache hit? ──yes──────────────────────────────► return cached
//!           │ no
//!           ▼
//!         resolution in flight for key? ──yes──► await it ─► return shared
//!           │ no
//!           ▼
//!         Racing: personalization task vs deadline timer
//!           ├─ primary wins, candidates survive filtering ─► PrimaryWon
//!           └─ deadline / error / empty / panic ───────────► Fallback
//!           ▼
//!         Resolved: cache (TTL by source), notify waiters, return
//! ```
//!
//! A primary call that loses the race keeps running detached. When late
//! cache warming is enabled its eventual result replaces the fallback entry.

use super::cache::{CacheKey, InFlightRegistry, ResultCache};
use super::clock::{Clock, TokioClock};
use super::fallback::{emergency_candidates, FallbackChain};
use super::filter::{filter_and_rank, FilterCriteria};
use super::retry::RetryPolicy;
use super::stats::{EngineStats, StatsSnapshot};
use crate::error::TierError;
use crate::providers::{
    CatalogProvider, InMemoryPreferences, PersonalizationProvider, PreferenceSignals, PreferenceStore,
};
use bowl_common::{
    EngineParams, Error, RecommendationCandidate, RecommendationRequest, RecommendationResult,
    RecommendationSource, Result,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

type PrimaryTask = JoinHandle<std::result::Result<Vec<RecommendationCandidate>, TierError>>;

/// Recommendation engine service
///
/// Cheap to clone; all clones share one cache, in-flight registry and set
/// of collaborators. Construct with [`RecommendationEngine::builder`].
#[derive(Clone)]
pub struct RecommendationEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    params: EngineParams,
    personalization: Arc<dyn PersonalizationProvider>,
    catalog: Arc<dyn CatalogProvider>,
    preferences: Arc<dyn PreferenceStore>,
    clock: Arc<dyn Clock>,
    cache: ResultCache,
    in_flight: InFlightRegistry<CacheKey, Arc<RecommendationResult>>,
    fallback: FallbackChain,
    stats: EngineStats,
}

pub struct EngineBuilder {
    personalization: Arc<dyn PersonalizationProvider>,
    catalog: Arc<dyn CatalogProvider>,
    preferences: Option<Arc<dyn PreferenceStore>>,
    clock: Option<Arc<dyn Clock>>,
    params: EngineParams,
}

impl EngineBuilder {
    pub fn params(mut self, params: EngineParams) -> Self {
        self.params = params;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Validate parameters and assemble the engine
    pub fn build(self) -> Result<RecommendationEngine> {
        self.params.validate().map_err(Error::Config)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock));
        let preferences = self
            .preferences
            .unwrap_or_else(|| Arc::new(InMemoryPreferences::new()));
        let fallback = FallbackChain::new(
            Arc::clone(&self.catalog),
            Arc::clone(&clock),
            RetryPolicy::from_params(&self.params),
            self.params.tier_timeout(),
        );

        Ok(RecommendationEngine {
            inner: Arc::new(EngineInner {
                params: self.params,
                personalization: self.personalization,
                catalog: self.catalog,
                preferences,
                cache: ResultCache::new(Arc::clone(&clock)),
                clock,
                in_flight: InFlightRegistry::new(),
                fallback,
                stats: EngineStats::default(),
            }),
        })
    }
}

impl RecommendationEngine {
    pub fn builder(
        personalization: Arc<dyn PersonalizationProvider>,
        catalog: Arc<dyn CatalogProvider>,
    ) -> EngineBuilder {
        EngineBuilder {
            personalization,
            catalog,
            preferences: None,
            clock: None,
            params: EngineParams::default(),
        }
    }

    /// Resolve a request to ranked recommendations
    ///
    /// Never fails: when every source is down the emergency bowl is served.
    /// Concurrent calls with the same cache key share one resolution and
    /// receive the same `Arc`.
    pub async fn resolve(&self, request: &RecommendationRequest) -> Arc<RecommendationResult> {
        let key = CacheKey::for_request(request);

        if let Some(hit) = self.inner.cache.get(&key) {
            debug!(location = %request.location_id(), source = %hit.source, "Result cache hit");
            return hit;
        }

        let inner = Arc::clone(&self.inner);
        let owned_request = request.clone();
        let recover = {
            let inner = Arc::clone(&self.inner);
            let location = request.location_id().to_string();
            move || {
                error!(location = %location, "Resolution task panicked, serving emergency bowl");
                inner.stats.record(RecommendationSource::Emergency);
                Arc::new(RecommendationResult::new(
                    emergency_candidates(),
                    RecommendationSource::Emergency,
                    0,
                ))
            }
        };

        self.inner
            .in_flight
            .get_or_create(
                key.clone(),
                async move { inner.resolve_uncached(owned_request, key).await },
                recover,
            )
            .await
    }

    pub fn params(&self) -> &EngineParams {
        &self.inner.params
    }

    /// Result cache, shared by every clone of this engine
    pub fn cache(&self) -> &ResultCache {
        &self.inner.cache
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_entries: self.inner.cache.len(),
            cache_hits: self.inner.cache.hits(),
            cache_misses: self.inner.cache.misses(),
            in_flight: self.inner.in_flight.len(),
            coalesced: self.inner.in_flight.coalesced(),
            ..Default::default()
        }
        .with_outcomes(&self.inner.stats)
    }

    /// Periodically purge expired cache entries until `shutdown` is cancelled
    pub fn spawn_cache_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let period = inner.params.cache_sweep_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Cache sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = inner.cache.purge_expired();
                        if removed > 0 {
                            debug!(removed, remaining = inner.cache.len(), "Purged expired cache entries");
                        }
                    }
                }
            }
        })
    }
}

impl EngineInner {
    async fn resolve_uncached(
        self: Arc<Self>,
        request: RecommendationRequest,
        key: CacheKey,
    ) -> Arc<RecommendationResult> {
        let resolution_id = Uuid::new_v4();
        let span = info_span!(
            "resolve",
            %resolution_id,
            location = %request.location_id(),
            user = request.user_id().unwrap_or("anonymous"),
        );

        async move {
            let started = self.clock.now();
            let limit = request.limit().min(self.params.max_results);
            let preferences = request
                .user_id()
                .and_then(|user_id| self.preferences.signals(user_id));
            let criteria =
                FilterCriteria::for_request(&request, preferences.as_ref(), self.params.preference_boost);

            debug!(state = "racing", timeout_ms = self.params.primary_timeout_ms, "Racing personalization against deadline");
            let won = self.race_primary(&request, &key, &criteria, preferences.clone(), limit).await;

            let (source, candidates) = match won {
                Some(candidates) => {
                    debug!(state = "primary_won", count = candidates.len(), "Personalization won the race");
                    self.catalog.record_success(&request, &candidates);
                    (RecommendationSource::Ml, candidates)
                }
                None => {
                    debug!(state = "fallback", "Walking fallback chain");
                    let outcome = self.fallback.run(&request, &criteria, limit).await;
                    (outcome.source, outcome.candidates)
                }
            };

            let elapsed_ms = self.clock.now().saturating_duration_since(started).as_millis() as u64;
            let result = Arc::new(RecommendationResult::new(candidates, source, elapsed_ms));

            let ttl = if source == RecommendationSource::Ml {
                self.params.ml_result_ttl()
            } else {
                self.params.fallback_result_ttl()
            };
            self.cache.set(key, Arc::clone(&result), ttl);
            self.stats.record(source);

            debug!(state = "resolved", "Resolution complete");
            info!(
                source = %source,
                count = result.recommendations.len(),
                confidence = result.confidence,
                elapsed_ms,
                "Recommendations resolved"
            );
            result
        }
        .instrument(span)
        .await
    }

    /// Race the personalization call against the deadline
    ///
    /// Returns filtered candidates if the primary won with something usable.
    async fn race_primary(
        self: &Arc<Self>,
        request: &RecommendationRequest,
        key: &CacheKey,
        criteria: &FilterCriteria<'_>,
        preferences: Option<PreferenceSignals>,
        limit: usize,
    ) -> Option<Vec<RecommendationCandidate>> {
        let mut primary: PrimaryTask = {
            let provider = Arc::clone(&self.personalization);
            let request = request.clone();
            tokio::spawn(async move { provider.recommend(&request).await })
        };
        let deadline = self.clock.sleep(self.params.primary_timeout());

        let outcome = tokio::select! {
            biased;
            joined = &mut primary => Some(joined.unwrap_or_else(|join_err| {
                Err(TierError::UpstreamFailure {
                    tier: RecommendationSource::Ml,
                    message: format!("personalization task failed: {}", join_err),
                })
            })),
            _ = deadline => None,
        };

        match outcome {
            Some(Ok(candidates)) => {
                let kept = filter_and_rank(&candidates, criteria, limit);
                if kept.is_empty() {
                    warn!(
                        tier = %RecommendationSource::Ml,
                        offered = candidates.len(),
                        "Personalization returned no usable candidates"
                    );
                    return None;
                }
                Some(kept)
            }
            Some(Err(err)) => {
                warn!(tier = %err.tier(), error = %err, "Personalization failed");
                None
            }
            None => {
                warn!(
                    tier = %RecommendationSource::Ml,
                    timeout_ms = self.params.primary_timeout_ms,
                    "Personalization missed deadline"
                );
                self.detach_primary(primary, request.clone(), key.clone(), preferences, limit);
                None
            }
        }
    }

    /// Let a losing primary finish in the background
    fn detach_primary(
        self: &Arc<Self>,
        primary: PrimaryTask,
        request: RecommendationRequest,
        key: CacheKey,
        preferences: Option<PreferenceSignals>,
        limit: usize,
    ) {
        if !self.params.warm_cache_from_late_primary {
            // Dropping the handle detaches the task without cancelling it
            drop(primary);
            return;
        }

        let inner = Arc::clone(self);
        let started = inner.clock.now();
        tokio::spawn(
            async move {
                let Ok(Ok(candidates)) = primary.await else {
                    debug!("Late personalization result unusable, cache left as is");
                    return;
                };

                let criteria =
                    FilterCriteria::for_request(&request, preferences.as_ref(), inner.params.preference_boost);
                let kept = filter_and_rank(&candidates, &criteria, limit);
                if kept.is_empty() {
                    return;
                }

                let late_ms = inner.clock.now().saturating_duration_since(started).as_millis() as u64;
                let total_ms = inner.params.primary_timeout_ms + late_ms;
                inner.catalog.record_success(&request, &kept);
                let result = RecommendationResult::new(kept, RecommendationSource::Ml, total_ms);
                inner.cache.set(key, Arc::new(result), inner.params.ml_result_ttl());
                inner.stats.record_late_warmup();
                info!(late_ms, "Late personalization result cached");
            }
            .in_current_span(),
        );
    }
}

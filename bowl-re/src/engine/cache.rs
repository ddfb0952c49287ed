//! Result cache and in-flight request deduplication
//!
//! **Cache:** TTL-bounded map from [`CacheKey`] to a shared result. Expiry is
//! measured on the injected [`Clock`]; an expired entry is evicted on read.
//!
//! **In-flight registry:** at most one resolution per key runs at a time.
//! The first caller spawns the resolution; concurrent callers for the same
//! key receive a clone of the same shared future. The registry entry is
//! removed by a guard owned by the spawned task, so it is gone before any
//! waiter observes the outcome, whether the task returned or panicked.
//! A panicked task is replaced by one recovery value, shared like any other
//! outcome.

use super::clock::Clock;
use bowl_common::{Allergen, DietaryRestriction, RecommendationRequest, RecommendationResult};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Everything about a request that can change its answer, apart from location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreferenceSignature {
    pub user_id: Option<String>,
    pub dietary_restrictions: BTreeSet<DietaryRestriction>,
    pub allergens: BTreeSet<Allergen>,
    pub available_ingredient_ids: BTreeSet<String>,
    pub limit: usize,
}

/// Composite cache and dedup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub signature: PreferenceSignature,
    pub location_id: String,
}

impl CacheKey {
    pub fn for_request(request: &RecommendationRequest) -> Self {
        Self {
            signature: PreferenceSignature {
                user_id: request.user_id().map(str::to_string),
                dietary_restrictions: request.dietary_restrictions().clone(),
                allergens: request.allergens().clone(),
                available_ingredient_ids: request.available_ingredient_ids().clone(),
                limit: request.limit(),
            },
            location_id: request.location_id().to_string(),
        }
    }
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe map whose entries expire after a per-entry TTL
pub struct TtlCache<K, V> {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Live value for `key`; an expired entry is removed and reported as a miss
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let value = match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        };

        let counter = if value.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Store `value`, replacing any existing entry as a whole
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, CacheEntry { value, expires_at });
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Entry count, including expired entries not yet purged
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Cache of final recommendation results
pub type ResultCache = TtlCache<CacheKey, Arc<RecommendationResult>>;

/// Outcome of a spawned resolution, observed identically by every waiter
pub type SharedResolution<V> = Shared<BoxFuture<'static, V>>;

/// Registry of resolutions currently in progress
pub struct InFlightRegistry<K, V> {
    entries: Arc<Mutex<HashMap<K, SharedResolution<V>>>>,
    coalesced: AtomicU64,
}

impl<K, V> InFlightRegistry<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Join the resolution running for `key`, or spawn `producer` as a new one
    ///
    /// If the spawned producer panics, `recover` is called once and its value
    /// is the outcome for every waiter. Must be called from within a tokio
    /// runtime.
    pub fn get_or_create<F, R>(&self, key: K, producer: F, recover: R) -> SharedResolution<V>
    where
        F: Future<Output = V> + Send + 'static,
        R: FnOnce() -> V + Send + 'static,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = entries.get(&key) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            return existing.clone();
        }

        // The lock is held until the entry is inserted, so the guard can
        // never run before the entry exists.
        let guard = RemoveOnDrop {
            entries: Arc::clone(&self.entries),
            key: Some(key.clone()),
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            producer.await
        });

        let shared = async move {
            match handle.await {
                Ok(value) => value,
                Err(_) => recover(),
            }
        }
        .boxed()
        .shared();
        entries.insert(key, shared.clone());
        shared
    }

    /// Number of resolutions currently running
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Callers that joined an existing resolution instead of starting one
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

impl<K, V> Default for InFlightRegistry<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

struct RemoveOnDrop<K: Hash + Eq, V> {
    entries: Arc<Mutex<HashMap<K, SharedResolution<V>>>>,
    key: Option<K>,
}

impl<K: Hash + Eq, V> Drop for RemoveOnDrop<K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::ManualClock;
    use std::sync::atomic::AtomicUsize;

    fn request(location: &str, user: Option<&str>) -> RecommendationRequest {
        let mut builder = RecommendationRequest::builder(location)
            .dietary_restriction(DietaryRestriction::Vegan)
            .allergen(Allergen::Peanuts);
        if let Some(user) = user {
            builder = builder.user_id(user);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_cache_key_is_structural() {
        let a = CacheKey::for_request(&request("downtown", Some("alice")));
        let b = CacheKey::for_request(&request("downtown", Some("alice")));
        assert_eq!(a, b);

        assert_ne!(a, CacheKey::for_request(&request("uptown", Some("alice"))));
        assert_ne!(a, CacheKey::for_request(&request("downtown", None)));

        // Values that would collide under naive string joining stay distinct
        let joined_left = CacheKey::for_request(&request("a|b", Some("c")));
        let joined_right = CacheKey::for_request(&request("a", Some("b|c")));
        assert_ne!(joined_left, joined_right);
    }

    #[test]
    fn test_ttl_expiry_on_read() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<&str, u32> = TtlCache::new(clock.clone());

        cache.set("k", 7, Duration::from_secs(60));
        assert_eq!(cache.get(&"k"), Some(7));

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get(&"k"), Some(7));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(&"k"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_set_replaces_whole_entry() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<&str, &str> = TtlCache::new(clock.clone());

        cache.set("k", "fallback", Duration::from_secs(60));
        cache.set("k", "ml", Duration::from_secs(300));
        clock.advance(Duration::from_secs(120));
        assert_eq!(cache.get(&"k"), Some("ml"));
    }

    #[test]
    fn test_purge_expired() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<u32, u32> = TtlCache::new(clock.clone());

        cache.set(1, 1, Duration::from_secs(60));
        cache.set(2, 2, Duration::from_secs(300));
        clock.advance(Duration::from_secs(120));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&2), Some(2));
    }

    #[tokio::test]
    async fn test_in_flight_dedup_runs_producer_once() {
        let registry: InFlightRegistry<&'static str, Arc<u32>> = InFlightRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let (release, gate) = tokio::sync::oneshot::channel::<()>();

        let first = {
            let runs = runs.clone();
            registry.get_or_create(
                "k",
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    let _ = gate.await;
                    Arc::new(42)
                },
                || Arc::new(0),
            )
        };
        let second = {
            let runs = runs.clone();
            registry.get_or_create(
                "k",
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Arc::new(0)
                },
                || Arc::new(0),
            )
        };
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.coalesced(), 1);

        release.send(()).unwrap();
        let (a, b) = tokio::join!(first, second);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, 42);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_in_flight_entry_removed_after_panic() {
        let registry: InFlightRegistry<u32, u32> = InFlightRegistry::new();

        let outcome = registry
            .get_or_create(
                1,
                async {
                    let failing = true;
                    assert!(!failing, "resolution failed");
                    0
                },
                || 99,
            )
            .await;
        assert_eq!(outcome, 99);
        assert!(registry.is_empty());

        // The key is usable again
        let outcome = registry.get_or_create(1, async { 5 }, || 99).await;
        assert_eq!(outcome, 5);
    }

    #[tokio::test]
    async fn test_panic_recovery_shared_by_all_waiters() {
        let registry: InFlightRegistry<&'static str, Arc<u32>> = InFlightRegistry::new();
        let recoveries = Arc::new(AtomicUsize::new(0));
        let (release, gate) = tokio::sync::oneshot::channel::<()>();

        let producer = async move {
            let _ = gate.await;
            let failing = true;
            assert!(!failing, "resolution failed");
            Arc::new(1)
        };
        let recover = {
            let recoveries = recoveries.clone();
            move || {
                recoveries.fetch_add(1, Ordering::SeqCst);
                Arc::new(7)
            }
        };
        let first = registry.get_or_create("k", producer, recover);
        let second = registry.get_or_create("k", async { Arc::new(2) }, || Arc::new(0));

        release.send(()).unwrap();
        let (a, b) = tokio::join!(first, second);

        assert_eq!(*a, 7);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(recoveries.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }
}

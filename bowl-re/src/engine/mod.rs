//! Recommendation resolution engine
//!
//! - `coordinator`: request entry point, deadline race, state transitions
//! - `fallback`: ordered non-personalized tiers ending in the emergency bowl
//! - `cache`: TTL result cache and in-flight deduplication
//! - `filter`: allergen/dietary/availability filtering and ranking
//! - `retry`: bounded exponential backoff
//! - `clock`: injectable time source

pub mod cache;
pub mod clock;
pub mod coordinator;
pub mod fallback;
pub mod filter;
pub mod retry;
pub mod stats;

pub use cache::{CacheKey, InFlightRegistry, PreferenceSignature, ResultCache, TtlCache};
pub use clock::{Clock, ManualClock, TokioClock};
pub use coordinator::{EngineBuilder, RecommendationEngine};
pub use fallback::{emergency_bowl, ChainOutcome, FallbackChain};
pub use filter::{filter_and_rank, FilterCriteria};
pub use retry::{with_retry, RetryError, RetryPolicy};
pub use stats::StatsSnapshot;

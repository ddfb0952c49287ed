//! Recommendation engine parameters
//!
//! All tunables of the resolution engine live in one `EngineParams` value that
//! is built once at startup and handed to the engine. There is no global
//! instance: tests construct their own.
//!
//! # Validation
//!
//! Every parameter has an entry in [`EngineParams::metadata`], the single
//! source of truth for its type, default, valid range and validator. String
//! input (TOML overrides, environment, API) is always routed through
//! [`EngineParams::set`] so a value outside its range can never be stored.
//!
//! # Usage
//!
//! ```rust
//! use bowl_common::params::EngineParams;
//!
//! let mut params = EngineParams::default();
//! params.set("primary_timeout_ms", "2500").unwrap();
//! assert!(params.set("primary_timeout_ms", "500").is_err());
//! params.validate().unwrap();
//! ```

use std::time::Duration;

mod metadata;

/// Tunables for the recommendation resolution engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineParams {
    /// Deadline for the personalization call
    ///
    /// Valid range: [1000, 10000] ms
    /// Default: 3000 ms
    pub primary_timeout_ms: u64,

    /// Total attempts per fallback tier call
    ///
    /// Valid range: [1, 5]
    /// Default: 3
    pub retry_attempts: u32,

    /// First backoff delay; doubles after every failed attempt
    ///
    /// Valid range: [10, 5000] ms
    /// Default: 100 ms
    pub retry_base_delay_ms: u64,

    /// Timeout applied to each individual attempt
    ///
    /// Valid range: [50, 10000] ms
    /// Default: 800 ms
    /// Must not exceed `tier_timeout_ms`
    pub attempt_timeout_ms: u64,

    /// Budget for one fallback tier including all of its retries
    ///
    /// Valid range: [100, 10000] ms
    /// Default: 1500 ms
    /// Must not exceed `primary_timeout_ms`
    pub tier_timeout_ms: u64,

    /// Result cache lifetime for personalized results
    ///
    /// Valid range: >= 60000 ms
    /// Default: 300000 ms (5 minutes)
    pub ml_result_ttl_ms: u64,

    /// Result cache lifetime for fallback results
    ///
    /// Valid range: >= 60000 ms
    /// Default: 60000 ms (1 minute)
    /// Kept short so personalization gets another chance soon
    pub fallback_result_ttl_ms: u64,

    /// Lifetime of remembered personalized picks served by the `cached` tier
    ///
    /// Valid range: >= 60000 ms
    /// Default: 3600000 ms (1 hour)
    pub recent_ml_ttl_ms: u64,

    /// Hard cap on recommendations per result
    ///
    /// Valid range: [1, 20]
    /// Default: 5
    pub max_results: usize,

    /// Additive confidence boost per ingredient matching user preferences
    ///
    /// Valid range: [0.0, 0.5]
    /// Default: 0.05
    pub preference_boost: f32,

    /// Let a primary call that lost the deadline race still populate the cache
    ///
    /// Default: true
    pub warm_cache_from_late_primary: bool,

    /// Period of the expired-entry sweeper
    ///
    /// Valid range: [1000, 3600000] ms
    /// Default: 60000 ms
    pub cache_sweep_interval_ms: u64,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            primary_timeout_ms: 3000,
            retry_attempts: 3,
            retry_base_delay_ms: 100,
            attempt_timeout_ms: 800,
            tier_timeout_ms: 1500,
            ml_result_ttl_ms: 300_000,
            fallback_result_ttl_ms: 60_000,
            recent_ml_ttl_ms: 3_600_000,
            max_results: 5,
            preference_boost: 0.05,
            warm_cache_from_late_primary: true,
            cache_sweep_interval_ms: 60_000,
        }
    }
}

// ============================================================================
// Parameter Metadata
// ============================================================================

/// Metadata for a single engine parameter
///
/// # Validator Signature
///
/// All validators have signature `fn(&str) -> Result<(), String>`.
/// Error format: `"{param_name}: {specific_reason}"`
pub struct ParamMetadata {
    pub key: &'static str,
    pub data_type: &'static str,
    pub default_value: &'static str,
    pub description: &'static str,
    pub validation_range: &'static str,
    pub validator: fn(&str) -> Result<(), String>,
}

impl ParamMetadata {
    pub fn validate(&self, value: &str) -> Result<(), String> {
        (self.validator)(value)
    }
}

impl EngineParams {
    /// Look up metadata for a parameter key
    pub fn metadata_for(key: &str) -> Option<&'static ParamMetadata> {
        Self::metadata().iter().find(|m| m.key == key)
    }

    /// Validate and update a parameter from its string form
    ///
    /// Unknown keys and out-of-range values are rejected; the stored value is
    /// left untouched on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let meta = Self::metadata_for(key).ok_or_else(|| format!("{}: unknown parameter", key))?;
        let value = value.trim();
        meta.validate(value)?;

        // Validators already proved the value parses
        let parse_err = |_| format!("{}: invalid format", key);
        match key {
            "primary_timeout_ms" => self.primary_timeout_ms = value.parse().map_err(parse_err)?,
            "retry_attempts" => self.retry_attempts = value.parse().map_err(parse_err)?,
            "retry_base_delay_ms" => self.retry_base_delay_ms = value.parse().map_err(parse_err)?,
            "attempt_timeout_ms" => self.attempt_timeout_ms = value.parse().map_err(parse_err)?,
            "tier_timeout_ms" => self.tier_timeout_ms = value.parse().map_err(parse_err)?,
            "ml_result_ttl_ms" => self.ml_result_ttl_ms = value.parse().map_err(parse_err)?,
            "fallback_result_ttl_ms" => {
                self.fallback_result_ttl_ms = value.parse().map_err(parse_err)?
            }
            "recent_ml_ttl_ms" => self.recent_ml_ttl_ms = value.parse().map_err(parse_err)?,
            "max_results" => self.max_results = value.parse().map_err(parse_err)?,
            "preference_boost" => {
                self.preference_boost = value
                    .parse()
                    .map_err(|_| format!("{}: invalid format", key))?
            }
            "warm_cache_from_late_primary" => {
                self.warm_cache_from_late_primary = value
                    .parse()
                    .map_err(|_| format!("{}: invalid format", key))?
            }
            "cache_sweep_interval_ms" => {
                self.cache_sweep_interval_ms = value.parse().map_err(parse_err)?
            }
            _ => return Err(format!("{}: unknown parameter", key)),
        }
        Ok(())
    }

    /// Current value of a parameter in its string form
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "primary_timeout_ms" => self.primary_timeout_ms.to_string(),
            "retry_attempts" => self.retry_attempts.to_string(),
            "retry_base_delay_ms" => self.retry_base_delay_ms.to_string(),
            "attempt_timeout_ms" => self.attempt_timeout_ms.to_string(),
            "tier_timeout_ms" => self.tier_timeout_ms.to_string(),
            "ml_result_ttl_ms" => self.ml_result_ttl_ms.to_string(),
            "fallback_result_ttl_ms" => self.fallback_result_ttl_ms.to_string(),
            "recent_ml_ttl_ms" => self.recent_ml_ttl_ms.to_string(),
            "max_results" => self.max_results.to_string(),
            "preference_boost" => self.preference_boost.to_string(),
            "warm_cache_from_late_primary" => self.warm_cache_from_late_primary.to_string(),
            "cache_sweep_interval_ms" => self.cache_sweep_interval_ms.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Check every value against its range plus cross-parameter constraints
    ///
    /// Fields are public, so a value assembled in code is re-checked here
    /// before the engine accepts it.
    pub fn validate(&self) -> Result<(), String> {
        for meta in Self::metadata() {
            let current = self
                .get(meta.key)
                .ok_or_else(|| format!("{}: missing accessor", meta.key))?;
            meta.validate(&current)?;
        }

        if self.attempt_timeout_ms > self.tier_timeout_ms {
            return Err(format!(
                "attempt_timeout_ms: {} exceeds tier_timeout_ms {}",
                self.attempt_timeout_ms, self.tier_timeout_ms
            ));
        }
        if self.tier_timeout_ms > self.primary_timeout_ms {
            return Err(format!(
                "tier_timeout_ms: {} exceeds primary_timeout_ms {}",
                self.tier_timeout_ms, self.primary_timeout_ms
            ));
        }
        Ok(())
    }

    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn tier_timeout(&self) -> Duration {
        Duration::from_millis(self.tier_timeout_ms)
    }

    pub fn ml_result_ttl(&self) -> Duration {
        Duration::from_millis(self.ml_result_ttl_ms)
    }

    pub fn fallback_result_ttl(&self) -> Duration {
        Duration::from_millis(self.fallback_result_ttl_ms)
    }

    pub fn recent_ml_ttl(&self) -> Duration {
        Duration::from_millis(self.recent_ml_ttl_ms)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.cache_sweep_interval_ms)
    }
}

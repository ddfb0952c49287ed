//! Parameter metadata definitions
//!
//! Single source of truth for parameter validation

use super::{EngineParams, ParamMetadata};

fn check_u64_range(key: &str, s: &str, min: u64, max: u64) -> Result<(), String> {
    let v: u64 = s
        .parse()
        .map_err(|_| format!("{}: invalid number format", key))?;
    if !(min..=max).contains(&v) {
        return Err(format!("{}: value {} out of range [{}, {}]", key, v, min, max));
    }
    Ok(())
}

fn check_ttl(key: &str, s: &str) -> Result<(), String> {
    let v: u64 = s
        .parse()
        .map_err(|_| format!("{}: invalid number format", key))?;
    if v < 60_000 {
        return Err(format!("{}: value {} below minimum 60000 ms", key, v));
    }
    Ok(())
}

impl EngineParams {
    /// Get metadata for all engine parameters
    ///
    /// # Example: Validating a Parameter
    ///
    /// ```rust
    /// # use bowl_common::params::EngineParams;
    /// let meta = EngineParams::metadata_for("retry_attempts").unwrap();
    ///
    /// assert!(meta.validate("3").is_ok());
    /// assert!(meta.validate("6").is_err());
    /// ```
    pub fn metadata() -> &'static [ParamMetadata] {
        &[
            ParamMetadata {
                key: "primary_timeout_ms",
                data_type: "u64",
                default_value: "3000",
                description: "Deadline for the personalization call (ms)",
                validation_range: "1000-10000",
                validator: |s| check_u64_range("primary_timeout_ms", s, 1000, 10_000),
            },
            ParamMetadata {
                key: "retry_attempts",
                data_type: "u32",
                default_value: "3",
                description: "Total attempts per fallback tier call",
                validation_range: "1-5",
                validator: |s| check_u64_range("retry_attempts", s, 1, 5),
            },
            ParamMetadata {
                key: "retry_base_delay_ms",
                data_type: "u64",
                default_value: "100",
                description: "First retry backoff delay, doubled per attempt (ms)",
                validation_range: "10-5000",
                validator: |s| check_u64_range("retry_base_delay_ms", s, 10, 5000),
            },
            ParamMetadata {
                key: "attempt_timeout_ms",
                data_type: "u64",
                default_value: "800",
                description: "Timeout for a single tier call attempt (ms)",
                validation_range: "50-10000",
                validator: |s| check_u64_range("attempt_timeout_ms", s, 50, 10_000),
            },
            ParamMetadata {
                key: "tier_timeout_ms",
                data_type: "u64",
                default_value: "1500",
                description: "Budget for one fallback tier including retries (ms)",
                validation_range: "100-10000",
                validator: |s| check_u64_range("tier_timeout_ms", s, 100, 10_000),
            },
            ParamMetadata {
                key: "ml_result_ttl_ms",
                data_type: "u64",
                default_value: "300000",
                description: "Result cache lifetime for personalized results (ms)",
                validation_range: ">=60000",
                validator: |s| check_ttl("ml_result_ttl_ms", s),
            },
            ParamMetadata {
                key: "fallback_result_ttl_ms",
                data_type: "u64",
                default_value: "60000",
                description: "Result cache lifetime for fallback results (ms)",
                validation_range: ">=60000",
                validator: |s| check_ttl("fallback_result_ttl_ms", s),
            },
            ParamMetadata {
                key: "recent_ml_ttl_ms",
                data_type: "u64",
                default_value: "3600000",
                description: "Lifetime of remembered personalized picks (ms)",
                validation_range: ">=60000",
                validator: |s| check_ttl("recent_ml_ttl_ms", s),
            },
            ParamMetadata {
                key: "max_results",
                data_type: "usize",
                default_value: "5",
                description: "Maximum recommendations per result",
                validation_range: "1-20",
                validator: |s| check_u64_range("max_results", s, 1, 20),
            },
            ParamMetadata {
                key: "preference_boost",
                data_type: "f32",
                default_value: "0.05",
                description: "Confidence boost per preferred ingredient",
                validation_range: "0.0-0.5",
                validator: |s| {
                    let v: f32 = s
                        .parse()
                        .map_err(|_| "preference_boost: invalid number format".to_string())?;
                    if !(0.0..=0.5).contains(&v) {
                        return Err(format!("preference_boost: value {} out of range [0.0, 0.5]", v));
                    }
                    Ok(())
                },
            },
            ParamMetadata {
                key: "warm_cache_from_late_primary",
                data_type: "bool",
                default_value: "true",
                description: "Cache personalization results that arrive after the deadline",
                validation_range: "true|false",
                validator: |s| {
                    s.parse::<bool>()
                        .map(|_| ())
                        .map_err(|_| format!("warm_cache_from_late_primary: expected true or false, got {}", s))
                },
            },
            ParamMetadata {
                key: "cache_sweep_interval_ms",
                data_type: "u64",
                default_value: "60000",
                description: "Period of the expired cache entry sweeper (ms)",
                validation_range: "1000-3600000",
                validator: |s| check_u64_range("cache_sweep_interval_ms", s, 1000, 3_600_000),
            },
        ]
    }
}

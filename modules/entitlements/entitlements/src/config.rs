//! Configuration for the entitlement engine.

use std::time::Duration;

use entitlements_sdk::PlanLimits;
use serde::{Deserialize, Serialize};

/// Entitlement engine configuration.
///
/// All durations use the humantime format ("5m", "30m", "7d").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntitlementsConfig {
    /// How long a resolved status is served from cache without re-resolving.
    #[serde(with = "crate::util::humantime_serde")]
    pub cache_ttl: Duration,

    /// On resolver failure a cached value up to `cache_ttl × grace` old is
    /// still served instead of the conservative default.
    pub cache_grace_multiplier: u32,

    /// Maximum number of cached subjects.
    pub cache_max_entries: u64,

    /// Interval between periodic validation passes.
    #[serde(with = "crate::util::humantime_serde")]
    pub validation_interval: Duration,

    /// Minimum gap between validations triggered by foreground transitions.
    #[serde(with = "crate::util::humantime_serde")]
    pub min_refresh_gap: Duration,

    /// Free-trial window, anchored to the record's creation time.
    #[serde(with = "crate::util::humantime_serde")]
    pub trial_window: Duration,

    /// Record updates younger than this classify as manual changes.
    #[serde(with = "crate::util::humantime_serde")]
    pub manual_change_window: Duration,

    /// Timeout applied to every record-store and billing-provider call.
    #[serde(with = "crate::util::humantime_serde")]
    pub external_call_timeout: Duration,

    /// `payment_platform` tag written on records synced from the billing
    /// provider; records carrying any other tag are never downgraded by a
    /// validation pass.
    pub billing_platform: String,

    /// Limits applied to subjects without premium access.
    pub free_trial_limits: PlanLimits,
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_cache_grace_multiplier() -> u32 {
    3
}

fn default_cache_max_entries() -> u64 {
    10_000
}

fn default_validation_interval() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_min_refresh_gap() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_trial_window() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_manual_change_window() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_external_call_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_billing_platform() -> String {
    "billing".to_owned()
}

fn default_free_trial_limits() -> PlanLimits {
    PlanLimits {
        max_companies: 1,
        max_cashbooks: 2,
        max_transactions: 100,
    }
}

impl Default for EntitlementsConfig {
    fn default() -> Self {
        Self {
            cache_ttl: default_cache_ttl(),
            cache_grace_multiplier: default_cache_grace_multiplier(),
            cache_max_entries: default_cache_max_entries(),
            validation_interval: default_validation_interval(),
            min_refresh_gap: default_min_refresh_gap(),
            trial_window: default_trial_window(),
            manual_change_window: default_manual_change_window(),
            external_call_timeout: default_external_call_timeout(),
            billing_platform: default_billing_platform(),
            free_trial_limits: default_free_trial_limits(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = EntitlementsConfig::default();
        assert_eq!(cfg.cache_ttl, Duration::from_secs(300));
        assert_eq!(cfg.cache_grace_multiplier, 3);
        assert_eq!(cfg.validation_interval, Duration::from_secs(1800));
        assert_eq!(cfg.min_refresh_gap, Duration::from_secs(300));
        assert_eq!(cfg.trial_window, Duration::from_secs(7 * 24 * 3600));
        assert_eq!(cfg.manual_change_window, Duration::from_secs(300));
        assert_eq!(cfg.free_trial_limits.max_companies, 1);
        assert_eq!(cfg.free_trial_limits.max_cashbooks, 2);
        assert_eq!(cfg.free_trial_limits.max_transactions, 100);
    }

    #[test]
    fn parses_partial_override() {
        let cfg: EntitlementsConfig = serde_json::from_str(
            r#"{"cache_ttl": "1m", "trial_window": "14days", "billing_platform": "storekit"}"#,
        )
        .unwrap();
        assert_eq!(cfg.cache_ttl, Duration::from_secs(60));
        assert_eq!(cfg.trial_window, Duration::from_secs(14 * 24 * 3600));
        assert_eq!(cfg.billing_platform, "storekit");
        // untouched fields keep their defaults
        assert_eq!(cfg.validation_interval, Duration::from_secs(1800));
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = serde_json::from_str::<EntitlementsConfig>(r#"{"cache_ttlz": "1m"}"#);
        assert!(result.is_err());
    }
}

//! Public models for the entitlements module.
//!
//! These are transport-agnostic data structures that define the contract
//! between the entitlement engine and its consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Sentinel limit value meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// The identity an entitlement record is keyed on: a normalized email.
///
/// Construction trims surrounding whitespace and lowercases, so two subjects
/// compare equal whenever the record store would treat them as the same user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    pub fn new(email: impl AsRef<str>) -> Self {
        Self(email.as_ref().trim().to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Subject {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Subject {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

/// Status of a durable entitlement record.
///
/// `Pending` denotes a free-trial window anchored to the record's
/// `created_at`; past the trial window a pending record confers nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementStatus {
    Active,
    Pending,
    Cancelled,
    Expired,
}

impl std::fmt::Display for EntitlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Subscription state as seen by feature-gating callers.
///
/// Unlike [`EntitlementStatus`] this includes `None` for subjects with no
/// record at all; absence of entitlement is a normal state, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Active,
    Pending,
    Expired,
    Cancelled,
    None,
}

impl From<EntitlementStatus> for SubscriptionState {
    fn from(status: EntitlementStatus) -> Self {
        match status {
            EntitlementStatus::Active => Self::Active,
            EntitlementStatus::Pending => Self::Pending,
            EntitlementStatus::Cancelled => Self::Cancelled,
            EntitlementStatus::Expired => Self::Expired,
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// Resource creation limits for a plan. `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_companies: i64,
    pub max_cashbooks: i64,
    pub max_transactions: i64,
}

impl PlanLimits {
    /// Limits for premium subscribers: everything unlimited.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_companies: UNLIMITED,
            max_cashbooks: UNLIMITED,
            max_transactions: UNLIMITED,
        }
    }
}

/// The derived entitlement for a subject; never persisted.
///
/// This is the only shape exposed to feature-gating callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStatus {
    pub is_premium: bool,
    pub is_free_trial: bool,
    pub state: SubscriptionState,
    /// Days left in the free trial, rounded up. Only set while trialing.
    pub time_remaining_days: Option<i64>,
    pub limits: PlanLimits,
}

impl ResolvedStatus {
    /// Premium entitlement: unlimited everything.
    #[must_use]
    pub fn premium() -> Self {
        Self {
            is_premium: true,
            is_free_trial: false,
            state: SubscriptionState::Active,
            time_remaining_days: None,
            limits: PlanLimits::unlimited(),
        }
    }

    /// No entitlement: free-trial limits, state as given.
    #[must_use]
    pub fn free_tier(state: SubscriptionState, limits: PlanLimits) -> Self {
        Self {
            is_premium: false,
            is_free_trial: false,
            state,
            time_remaining_days: None,
            limits,
        }
    }

    /// An active free trial with the given days remaining.
    #[must_use]
    pub fn free_trial(time_remaining_days: i64, limits: PlanLimits) -> Self {
        Self {
            is_premium: false,
            is_free_trial: true,
            state: SubscriptionState::Pending,
            time_remaining_days: Some(time_remaining_days),
            limits,
        }
    }
}

/// A durable entitlement record, one per subject.
///
/// `id`, `created_at`, and `updated_at` are owned by the record store;
/// `created_at` anchors the free-trial window and is immutable once set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub id: Uuid,
    pub subject: Subject,
    pub status: EntitlementStatus,
    pub plan_id: Option<String>,
    /// Distinguishes manual/admin grants from billing-originated ones.
    pub payment_platform: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Free-text audit trail for manual operations.
    pub notes: Option<String>,
}

/// Fields to write on an upsert. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub status: Option<EntitlementStatus>,
    pub plan_id: Option<String>,
    pub payment_platform: Option<String>,
    pub notes: Option<String>,
}

/// Result of a resource-creation gating check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    pub allowed: bool,
    pub message: Option<String>,
}

impl Gate {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: None,
        }
    }

    #[must_use]
    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: Some(message.into()),
        }
    }
}

/// Options for a manual premium grant.
#[derive(Debug, Clone, Default)]
pub struct GrantOptions {
    pub plan_id: Option<String>,
    pub notes: Option<String>,
    /// Granting channel recorded as the payment platform (defaults to "manual").
    pub source: Option<String>,
}

/// Options for starting a free trial.
#[derive(Debug, Clone, Default)]
pub struct TrialOptions {
    pub notes: Option<String>,
    pub source: Option<String>,
}

/// Options for revoke/cancel operations.
#[derive(Debug, Clone, Default)]
pub struct RevokeOptions {
    pub notes: Option<String>,
}

/// A subscription managed by an external payment provider.
#[derive(Debug, Clone)]
pub struct ExternalSubscriptionUpdate {
    pub payment_provider: String,
    pub plan_id: String,
    pub is_active: bool,
    pub notes: Option<String>,
}

impl ExternalSubscriptionUpdate {
    #[must_use]
    pub fn new(payment_provider: impl Into<String>, plan_id: impl Into<String>) -> Self {
        Self {
            payment_provider: payment_provider.into(),
            plan_id: plan_id.into(),
            is_active: true,
            notes: None,
        }
    }
}

/// Per-subject outcome of a bulk grant.
#[derive(Debug, Clone)]
pub struct BulkGrantResult {
    pub subject: Subject,
    pub success: bool,
    pub message: Option<String>,
}

/// Aggregate outcome of a bulk grant; individual failures never abort the batch.
#[derive(Debug, Clone)]
pub struct BulkGrantOutcome {
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BulkGrantResult>,
}

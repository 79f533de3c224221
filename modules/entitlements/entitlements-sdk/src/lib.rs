//! SDK for the entitlements module.
//!
//! Defines the public contract between the entitlement engine and its
//! consumers: the `EntitlementsApi` trait, transport-agnostic models, and
//! error definitions. Feature-gating code should depend on this crate only.

pub mod api;
pub mod errors;
pub mod models;

pub use api::EntitlementsApi;
pub use errors::EntitlementsError;
pub use models::{
    BulkGrantOutcome, BulkGrantResult, EntitlementRecord, EntitlementStatus,
    ExternalSubscriptionUpdate, Gate, GrantOptions, PlanLimits, RecordPatch, ResolvedStatus,
    RevokeOptions, Subject, SubscriptionState, TrialOptions, UNLIMITED,
};

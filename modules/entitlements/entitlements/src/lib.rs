//! Entitlement resolution and synchronization engine.
//!
//! Decides whether a subject has paid access by reconciling two sources of
//! truth: a durable, manually-editable record store (the system of record)
//! and an external billing provider (authoritative for real purchases).
//! Results are cached per subject, revalidated on a schedule and on
//! app-foreground transitions, and kept current by a realtime listener on
//! the record store.
//!
//! All long-lived components are plain service objects with constructor
//! injected dependencies and explicit `start`/`stop`/`destroy` lifecycles;
//! the composition root owns the wiring.

pub use entitlements_sdk as sdk;

pub mod config;
pub mod domain;
pub mod infra;
pub mod util;

pub use config::EntitlementsConfig;
pub use domain::admin::AdminOperations;
pub use domain::cache::EntitlementCache;
pub use domain::listener::{ChangeListener, RecordChange, RecordChangeKind};
pub use domain::resolver::StatusResolver;
pub use domain::service::EntitlementsService;
pub use domain::store::RecordStore;
pub use domain::validator::{PeriodicValidator, ValidationResult, ValidatorState};

//! Resource-creation gating: pure functions of plan limits vs counts.

use entitlements_sdk::{Gate, ResolvedStatus, UNLIMITED};

pub(crate) fn can_create_company(status: &ResolvedStatus, current_count: u64) -> Gate {
    check(status.limits.max_companies, current_count, "companies")
}

pub(crate) fn can_create_cashbook(status: &ResolvedStatus, current_count: u64) -> Gate {
    check(status.limits.max_cashbooks, current_count, "cashbooks")
}

pub(crate) fn can_create_transaction(status: &ResolvedStatus, current_count: u64) -> Gate {
    check(
        status.limits.max_transactions,
        current_count,
        "transactions per cashbook",
    )
}

fn check(limit: i64, current_count: u64, noun: &str) -> Gate {
    if limit == UNLIMITED {
        return Gate::allow();
    }

    let current = i64::try_from(current_count).unwrap_or(i64::MAX);
    if current < limit {
        Gate::allow()
    } else {
        Gate::deny(format!(
            "Your current plan allows up to {limit} {noun}. Upgrade to premium for unlimited access."
        ))
    }
}

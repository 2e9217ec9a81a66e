//! The period allocator — the core of reconciliation.
//!
//! Strict two-phase, addition-only allocation:
//!   Phase 1 clears a shortfall carried from the payer's previous payment.
//!     If the payment cannot cover it, the due period stays incomplete, a
//!     reduced shortfall for the same period is emitted, and phase 2 never
//!     runs.
//!   Phase 2 allocates whole expected-amount slices forward from the
//!     payment's own transaction month; a final partial slice marks that
//!     period incomplete.
//!
//! Invariants:
//!   - Allocated amounts sum to the payment total exactly.
//!   - At most one period is incomplete, and it is always the last touched.
//!   - A shortfall is returned iff the last touched period is incomplete.

use crate::error::{ReconError, ReconResult};
use crate::period::BillingPeriod;
use crate::types::Cents;
use serde::{Deserialize, Serialize};

/// The unpaid remainder of a period's expected amount, carried forward to
/// be cleared by the payer's next payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub amount: Cents,
    pub due_period: BillingPeriod,
}

/// Money applied to one billing period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodAllocation {
    pub period: BillingPeriod,
    pub amount: Cents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodState {
    Complete,
    Incomplete,
    Unrecognized,
}

/// Settlement state of one touched period. `period` is absent only on the
/// single `unrecognized` entry written for unmatched payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStatus {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub period: Option<BillingPeriod>,
    pub state: PeriodState,
}

impl PeriodStatus {
    pub fn unrecognized() -> Self {
        Self {
            period: None,
            state: PeriodState::Unrecognized,
        }
    }

    fn settled(period: BillingPeriod, state: PeriodState) -> Self {
        Self {
            period: Some(period),
            state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllocationOutcome {
    pub allocations: Vec<PeriodAllocation>,
    pub statuses: Vec<PeriodStatus>,
    pub shortfall: Option<Shortfall>,
}

impl AllocationOutcome {
    pub fn allocated_total(&self) -> Cents {
        self.allocations.iter().map(|a| a.amount).sum()
    }
}

/// Allocate `total` across billing periods.
///
/// `carried` is the shortfall left by the payer's most recent prior payment,
/// if any; entries with a non-positive amount are ignored. `start` is the
/// payment's own transaction month. A non-positive `expected` can never be
/// allocated against — callers must treat such payers as unrecognized
/// before reaching the allocator.
pub fn allocate(
    total: Cents,
    expected: Cents,
    carried: Option<&Shortfall>,
    start: BillingPeriod,
) -> ReconResult<AllocationOutcome> {
    if expected <= 0 {
        return Err(ReconError::NonPositiveExpected { amount: expected });
    }

    let mut remaining = total.max(0);
    let mut outcome = AllocationOutcome::default();

    // Phase 1: clear the carried shortfall at its original due period.
    if let Some(carried) = carried.filter(|s| s.amount > 0) {
        let due = carried.amount;
        if remaining >= due {
            outcome.allocations.push(PeriodAllocation {
                period: carried.due_period,
                amount: due,
            });
            outcome
                .statuses
                .push(PeriodStatus::settled(carried.due_period, PeriodState::Complete));
            remaining -= due;
        } else {
            outcome.allocations.push(PeriodAllocation {
                period: carried.due_period,
                amount: remaining,
            });
            outcome.statuses.push(PeriodStatus::settled(
                carried.due_period,
                PeriodState::Incomplete,
            ));
            outcome.shortfall = Some(Shortfall {
                amount: due - remaining,
                due_period: carried.due_period,
            });
            // The whole payment went into the old debt; phase 2 never runs.
            return Ok(outcome);
        }
    }

    // Phase 2: forward allocation from the transaction month.
    let mut cursor = start;
    while remaining > 0 {
        if remaining >= expected {
            outcome.allocations.push(PeriodAllocation {
                period: cursor,
                amount: expected,
            });
            outcome
                .statuses
                .push(PeriodStatus::settled(cursor, PeriodState::Complete));
            remaining -= expected;
            cursor = cursor.next();
        } else {
            outcome.allocations.push(PeriodAllocation {
                period: cursor,
                amount: remaining,
            });
            outcome
                .statuses
                .push(PeriodStatus::settled(cursor, PeriodState::Incomplete));
            outcome.shortfall = Some(Shortfall {
                amount: expected - remaining,
                due_period: cursor,
            });
            remaining = 0;
        }
    }

    Ok(outcome)
}

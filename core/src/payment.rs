//! Incoming payment events and the persisted payment record.

use crate::allocator::{PeriodAllocation, PeriodStatus, Shortfall};
use crate::error::{ReconError, ReconResult};
use crate::types::{Cents, PayerKey, PaymentSource, TransactionId};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A payment event entering reconciliation, already reduced to the fields
/// the engine needs. `payer_key` is the hashed (normalized) MSISDN.
#[derive(Debug, Clone)]
pub struct IncomingPayment {
    pub transaction_id: TransactionId,
    pub mpesa_amount: Cents,
    pub cash_amount: Cents,
    pub payer_key: PayerKey,
    pub paid_at: NaiveDateTime,
    pub source: PaymentSource,
    /// The gateway payload exactly as delivered, kept for audit.
    pub raw_payload: Option<serde_json::Value>,
}

impl IncomingPayment {
    pub fn total(&self) -> Cents {
        self.mpesa_amount + self.cash_amount
    }
}

/// A manually keyed payment (cash drop-offs, bank slips). Goes through the
/// same reconciliation path as gateway callbacks — never written directly.
#[derive(Debug, Clone)]
pub struct ManualPayment {
    /// Caller-supplied receipt number; a `MANUAL-<uuid>` id is generated
    /// when absent.
    pub transaction_id: Option<TransactionId>,
    pub mpesa_amount: Cents,
    pub cash_amount: Cents,
    pub msisdn: String,
    pub paid_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBreakdown {
    pub mpesa: Cents,
    pub cash: Cents,
    pub total: Cents,
}

/// The persisted result of reconciling one payment. One record per
/// transaction id; written exactly once. Monetary fields, allocations and
/// statuses are never mutated afterwards — only the identity fields may be
/// corrected by an administrator.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub transaction_id: TransactionId,
    pub plot_name: String,
    pub units: Option<u32>,
    pub amount: AmountBreakdown,
    pub payer_key: PayerKey,
    pub payer_name: String,
    pub paid_at_display: String,
    pub source: PaymentSource,
    pub allocations: Vec<PeriodAllocation>,
    pub statuses: Vec<PeriodStatus>,
    pub shortfall: Option<Shortfall>,
    pub raw_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Payment fields that may never be edited once the record exists.
const FORBIDDEN_EDITS: [&str; 7] = [
    "amount",
    "allocations",
    "statuses",
    "shortfall",
    "plot_name",
    "units",
    "source",
];

/// An administrator correction to a recorded payment's identity fields.
/// Everything else on a payment record is write-once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityCorrection {
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl IdentityCorrection {
    /// Build a correction from a JSON patch, rejecting any attempt to touch
    /// a write-once field. Unknown fields are ignored.
    pub fn from_patch(patch: &serde_json::Value) -> ReconResult<Self> {
        let obj = patch.as_object().ok_or_else(|| ReconError::CorruptRecord {
            detail: "identity patch must be a JSON object".into(),
        })?;

        for field in FORBIDDEN_EDITS {
            if obj.contains_key(field) {
                return Err(ReconError::ForbiddenEdit {
                    field: field.to_string(),
                });
            }
        }

        let text = |key: &str| {
            obj.get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        };
        Ok(Self {
            name: text("name"),
            phone: text("phone"),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none()
    }
}

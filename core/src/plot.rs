//! Billing records — "plots" in the landlord's vocabulary.
//!
//! A lumpsum plot bills one flat amount per period, paid from a single
//! phone number. An individual plot bills each tenant separately; every
//! tenant is their own payer.

use crate::types::{Cents, PayerKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant on an individual plot. `payer_key` is the hashed MSISDN the
/// resolver matches against; `phone` is the plaintext contact number kept
/// for payout display, if the record carries one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub name: String,
    pub phone: Option<String>,
    pub payer_key: PayerKey,
    pub expected_amount: Cents,
}

#[derive(Debug, Clone)]
pub enum PlotKind {
    Lumpsum {
        payer_key: PayerKey,
        expected_amount: Cents,
        payout_msisdn: Option<String>,
    },
    Individual {
        tenants: Vec<Tenant>,
    },
}

impl PlotKind {
    pub fn type_str(&self) -> &'static str {
        match self {
            PlotKind::Lumpsum { .. } => "lumpsum",
            PlotKind::Individual { .. } => "individual",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Plot {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    pub kind: PlotKind,
    pub units: u32,
    pub created_at: DateTime<Utc>,
}

impl Plot {
    pub fn lumpsum(
        id: impl Into<String>,
        name: impl Into<String>,
        units: u32,
        payer_key: PayerKey,
        expected_amount: Cents,
        payout_msisdn: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: None,
            kind: PlotKind::Lumpsum {
                payer_key,
                expected_amount,
                payout_msisdn,
            },
            units,
            created_at: Utc::now(),
        }
    }

    /// An individual plot always has exactly one unit per tenant.
    pub fn individual(
        id: impl Into<String>,
        name: impl Into<String>,
        tenants: Vec<Tenant>,
    ) -> Self {
        let units = tenants.len() as u32;
        Self {
            id: id.into(),
            name: name.into(),
            location: None,
            kind: PlotKind::Individual { tenants },
            units,
            created_at: Utc::now(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

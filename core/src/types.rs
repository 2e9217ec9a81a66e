//! Shared primitive types used across the reconciliation engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A monetary amount in integer cents. Addition and subtraction are exact;
/// allocation math must never lose a cent.
pub type Cents = i64;

/// The gateway's external transaction identifier — the idempotency key.
pub type TransactionId = String;

/// An opaque payer identity key. Usually the SHA-256 hex digest of a
/// normalized MSISDN; for resolved payers it may instead be the billing
/// record's canonical payout number. The engine never interprets it —
/// keys are only compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayerKey(String);

impl PayerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a payment event entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentSource {
    Stk,
    C2b,
    Manual,
}

impl PaymentSource {
    /// Stable string form used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentSource::Stk => "STK",
            PaymentSource::C2b => "C2B",
            PaymentSource::Manual => "MANUAL",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "STK" => Some(PaymentSource::Stk),
            "C2B" => Some(PaymentSource::C2b),
            "MANUAL" => Some(PaymentSource::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

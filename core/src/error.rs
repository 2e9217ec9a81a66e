use crate::types::Cents;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed billing period '{input}'")]
    MalformedPeriod { input: String },

    #[error("Malformed amount '{input}'")]
    MalformedAmount { input: String },

    #[error("Malformed transaction timestamp '{input}'")]
    MalformedTimestamp { input: String },

    #[error("Cannot allocate against non-positive expected amount {amount}")]
    NonPositiveExpected { amount: Cents },

    #[error("Editing '{field}' on a recorded payment is not allowed")]
    ForbiddenEdit { field: String },

    #[error("Corrupt stored record: {detail}")]
    CorruptRecord { detail: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ReconResult<T> = Result<T, ReconError>;

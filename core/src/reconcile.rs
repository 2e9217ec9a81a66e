//! The reconciliation engine — one unit of work per incoming payment.
//!
//! State machine per event:
//!   received → idempotency check → resolve payer → fetch carried
//!   shortfall → allocate → persist.
//!
//! Already-recorded transactions and unresolvable payers are outcomes, not
//! errors. Unmatched payments are always persisted (plot name "Unknown",
//! no allocations) — money is never discarded. A failed shortfall lookup
//! degrades to "no carried shortfall": the reconciliation itself must not
//! abort because a supporting query did.

use crate::allocator::{allocate, PeriodStatus, Shortfall};
use crate::callback::{
    display_time, parse_trans_time, C2bConfirmation, StkCallbackEnvelope,
};
use crate::error::ReconResult;
use crate::msisdn;
use crate::payment::{
    AmountBreakdown, IdentityCorrection, IncomingPayment, ManualPayment, PaymentRecord,
};
use crate::period::BillingPeriod;
use crate::resolver::{PayerIndex, ResolvedPayer};
use crate::store::ReconStore;
use crate::types::{PayerKey, PaymentSource};
use chrono::Utc;
use uuid::Uuid;

/// Why an event was dropped before reconciliation. Dropped events leave no
/// record; the transport layer still acknowledges the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The gateway reported a non-zero result code (cancelled, timed out).
    FailedResult { result_code: i64 },
    /// No phone number item in the callback metadata.
    MissingPhone,
    /// Missing or unparseable transaction timestamp.
    BadTimestamp,
    /// The payload does not have the gateway's documented shape.
    MalformedPayload,
}

#[derive(Debug)]
pub enum ReconOutcome {
    /// Resolved, allocated and persisted.
    Recorded(PaymentRecord),
    /// No billing record matched; persisted as an unknown payment.
    Unrecognized(PaymentRecord),
    /// This transaction id was already reconciled; nothing was modified.
    AlreadyRecorded,
    /// Filtered out before reconciliation; no record written.
    Dropped(DropReason),
}

pub struct ReconEngine {
    store: ReconStore,
}

impl ReconEngine {
    pub fn new(store: ReconStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ReconStore {
        &self.store
    }

    // ── Core reconciliation ────────────────────────────────────────

    /// Reconcile one incoming payment. At most one record is ever written
    /// per transaction id, no matter how often the gateway redelivers.
    pub fn reconcile(&self, payment: IncomingPayment) -> ReconResult<ReconOutcome> {
        if self.store.payment_exists(&payment.transaction_id)? {
            log::debug!(
                "txn {} already reconciled, skipping",
                payment.transaction_id
            );
            return Ok(ReconOutcome::AlreadyRecorded);
        }

        let plots = self.store.all_plots()?;
        let index = PayerIndex::build(&plots);

        match index.resolve(&payment.payer_key).usable().cloned() {
            Some(resolved) => self.reconcile_recognized(payment, resolved),
            None => self.persist_unrecognized(payment),
        }
    }

    fn reconcile_recognized(
        &self,
        payment: IncomingPayment,
        resolved: ResolvedPayer,
    ) -> ReconResult<ReconOutcome> {
        let carried = self.carried_shortfall(&resolved.payer_key);
        let start = BillingPeriod::containing(payment.paid_at);
        let outcome = allocate(
            payment.total(),
            resolved.expected_amount,
            carried.as_ref(),
            start,
        )?;

        let record = PaymentRecord {
            transaction_id: payment.transaction_id.clone(),
            plot_name: resolved.plot_name,
            units: Some(resolved.units),
            amount: AmountBreakdown {
                mpesa: payment.mpesa_amount,
                cash: payment.cash_amount,
                total: payment.total(),
            },
            payer_key: resolved.payer_key,
            payer_name: resolved.display_name,
            paid_at_display: display_time(&payment.paid_at),
            source: payment.source,
            allocations: outcome.allocations,
            statuses: outcome.statuses,
            shortfall: outcome.shortfall,
            raw_payload: payment.raw_payload,
            created_at: Utc::now(),
        };
        self.persist(record)
            .map(|written| match written {
                Some(record) => ReconOutcome::Recorded(record),
                None => ReconOutcome::AlreadyRecorded,
            })
    }

    fn persist_unrecognized(&self, payment: IncomingPayment) -> ReconResult<ReconOutcome> {
        log::info!(
            "txn {}: no billing record for payer, recording as Unknown",
            payment.transaction_id
        );
        let record = PaymentRecord {
            transaction_id: payment.transaction_id.clone(),
            plot_name: "Unknown".into(),
            units: None,
            amount: AmountBreakdown {
                mpesa: payment.mpesa_amount,
                cash: payment.cash_amount,
                total: payment.total(),
            },
            payer_key: payment.payer_key,
            payer_name: "Unknown".into(),
            paid_at_display: display_time(&payment.paid_at),
            source: payment.source,
            allocations: Vec::new(),
            statuses: vec![PeriodStatus::unrecognized()],
            shortfall: None,
            raw_payload: payment.raw_payload,
            created_at: Utc::now(),
        };
        self.persist(record)
            .map(|written| match written {
                Some(record) => ReconOutcome::Unrecognized(record),
                None => ReconOutcome::AlreadyRecorded,
            })
    }

    /// Idempotent write; a lost race to a concurrent duplicate delivery is
    /// reported as None. Failures are logged with the transaction id so the
    /// event can be replayed manually.
    fn persist(&self, record: PaymentRecord) -> ReconResult<Option<PaymentRecord>> {
        match self.store.insert_payment_if_absent(&record) {
            Ok(true) => {
                log::info!(
                    "txn {}: recorded {} ({} periods, shortfall {:?})",
                    record.transaction_id,
                    record.amount.total,
                    record.allocations.len(),
                    record.shortfall.as_ref().map(|s| s.amount),
                );
                Ok(Some(record))
            }
            Ok(false) => Ok(None),
            Err(e) => {
                log::error!(
                    "txn {}: reconciliation write failed: {e}",
                    record.transaction_id
                );
                Err(e)
            }
        }
    }

    /// The shortfall left by the payer's most recent prior payment, if any.
    /// Lookup failures must not abort reconciliation — degrade to none.
    fn carried_shortfall(&self, payer_key: &PayerKey) -> Option<Shortfall> {
        match self.store.latest_payment_for_payer(payer_key) {
            Ok(Some(prev)) => prev.shortfall.filter(|s| s.amount > 0),
            Ok(None) => None,
            Err(e) => {
                log::warn!(
                    "shortfall lookup failed for payer {payer_key}: {e}; treating as none"
                );
                None
            }
        }
    }

    // ── Gateway event adapters ─────────────────────────────────────

    /// Reconcile an STK push result callback. Only successful callbacks
    /// (result code 0) with an extractable phone number proceed; everything
    /// else is dropped without a record — a deliberate filter, not an
    /// error.
    pub fn reconcile_stk(&self, payload: &serde_json::Value) -> ReconResult<ReconOutcome> {
        let envelope: StkCallbackEnvelope = match serde_json::from_value(payload.clone()) {
            Ok(e) => e,
            Err(e) => {
                log::warn!("unparseable STK callback dropped: {e}");
                return Ok(ReconOutcome::Dropped(DropReason::MalformedPayload));
            }
        };
        let cb = &envelope.body.stk_callback;

        if cb.result_code != 0 {
            log::debug!(
                "STK {} dropped: result code {} ({})",
                cb.transaction_id(),
                cb.result_code,
                cb.result_desc
            );
            return Ok(ReconOutcome::Dropped(DropReason::FailedResult {
                result_code: cb.result_code,
            }));
        }
        let Some(phone) = cb.phone_number() else {
            log::warn!("STK {} dropped: no phone number item", cb.transaction_id());
            return Ok(ReconOutcome::Dropped(DropReason::MissingPhone));
        };
        let paid_at = match cb.transaction_date().as_deref().map(parse_trans_time) {
            Some(Ok(ts)) => ts,
            Some(Err(e)) => {
                log::warn!("STK {} dropped: {e}", cb.transaction_id());
                return Ok(ReconOutcome::Dropped(DropReason::BadTimestamp));
            }
            None => {
                log::warn!(
                    "STK {} dropped: no transaction date item",
                    cb.transaction_id()
                );
                return Ok(ReconOutcome::Dropped(DropReason::BadTimestamp));
            }
        };
        let mpesa_amount = match cb.amount().map(|v| v.to_cents()) {
            Some(Ok(cents)) => cents,
            Some(Err(e)) => {
                log::warn!("STK {} dropped: {e}", cb.transaction_id());
                return Ok(ReconOutcome::Dropped(DropReason::MalformedPayload));
            }
            None => 0,
        };

        self.reconcile(IncomingPayment {
            transaction_id: cb.transaction_id().to_string(),
            mpesa_amount,
            cash_amount: 0,
            payer_key: msisdn::hash(&msisdn::normalize(&phone)),
            paid_at,
            source: PaymentSource::Stk,
            raw_payload: Some(payload.clone()),
        })
    }

    /// Reconcile a C2B confirmation callback.
    pub fn reconcile_c2b(&self, payload: &serde_json::Value) -> ReconResult<ReconOutcome> {
        let conf: C2bConfirmation = match serde_json::from_value(payload.clone()) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("unparseable C2B confirmation dropped: {e}");
                return Ok(ReconOutcome::Dropped(DropReason::MalformedPayload));
            }
        };
        let paid_at = match parse_trans_time(&conf.trans_time) {
            Ok(ts) => ts,
            Err(e) => {
                log::warn!("C2B {} dropped: {e}", conf.trans_id);
                return Ok(ReconOutcome::Dropped(DropReason::BadTimestamp));
            }
        };

        let mpesa_amount = match conf.trans_amount.to_cents() {
            Ok(cents) => cents,
            Err(e) => {
                log::warn!("C2B {} dropped: {e}", conf.trans_id);
                return Ok(ReconOutcome::Dropped(DropReason::MalformedPayload));
            }
        };

        self.reconcile(IncomingPayment {
            transaction_id: conf.trans_id.clone(),
            mpesa_amount,
            cash_amount: 0,
            payer_key: msisdn::hash(&msisdn::normalize(&conf.msisdn)),
            paid_at,
            source: PaymentSource::C2b,
            raw_payload: Some(payload.clone()),
        })
    }

    /// Reconcile a manually keyed payment (cash or bank slip). Manual
    /// entries go through the exact same path as gateway callbacks; there
    /// is no way to write a payment record directly.
    pub fn reconcile_manual(&self, manual: ManualPayment) -> ReconResult<ReconOutcome> {
        let transaction_id = manual
            .transaction_id
            .unwrap_or_else(|| format!("MANUAL-{}", Uuid::new_v4()));
        self.reconcile(IncomingPayment {
            transaction_id,
            mpesa_amount: manual.mpesa_amount,
            cash_amount: manual.cash_amount,
            payer_key: msisdn::hash(&msisdn::normalize(&manual.msisdn)),
            paid_at: manual.paid_at,
            source: PaymentSource::Manual,
            raw_payload: None,
        })
    }

    // ── Administrator corrections ──────────────────────────────────

    /// Apply an identity correction from a JSON patch. Patches touching any
    /// write-once field are rejected outright.
    pub fn apply_identity_correction(
        &self,
        transaction_id: &str,
        patch: &serde_json::Value,
    ) -> ReconResult<bool> {
        let correction = IdentityCorrection::from_patch(patch)?;
        self.store
            .update_payment_identity(transaction_id, &correction)
    }
}

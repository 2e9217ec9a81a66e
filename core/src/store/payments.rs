use super::{parse_created_at, ReconStore};
use crate::allocator::Shortfall;
use crate::error::{ReconError, ReconResult};
use crate::payment::{AmountBreakdown, IdentityCorrection, PaymentRecord};
use crate::types::{PayerKey, PaymentSource};
use rusqlite::{params, OptionalExtension};

const PAYMENT_COLUMNS: &str = "transaction_id, plot_name, units,
        mpesa_amount, cash_amount, total_amount,
        payer_key, payer_name, paid_at_display, source,
        allocations, statuses, less_amount, less_due_period,
        raw_payload, created_at";

impl ReconStore {
    // ── Idempotent write ───────────────────────────────────────────

    /// Write a payment record unless one already exists for its
    /// transaction id. The primary-key conflict is the idempotency guard:
    /// existence check and write are a single statement, so concurrent
    /// duplicate callback deliveries cannot both land. Returns whether the
    /// record was written.
    pub fn insert_payment_if_absent(&self, record: &PaymentRecord) -> ReconResult<bool> {
        let raw_payload = record
            .raw_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO payment
             (transaction_id, plot_name, units,
              mpesa_amount, cash_amount, total_amount,
              payer_key, payer_name, paid_at_display, source,
              allocations, statuses, less_amount, less_due_period,
              raw_payload, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
            params![
                record.transaction_id,
                record.plot_name,
                record.units.map(|u| u as i64),
                record.amount.mpesa,
                record.amount.cash,
                record.amount.total,
                record.payer_key.as_str(),
                record.payer_name,
                record.paid_at_display,
                record.source.as_str(),
                serde_json::to_string(&record.allocations)?,
                serde_json::to_string(&record.statuses)?,
                record.shortfall.as_ref().map(|s| s.amount),
                record.shortfall.as_ref().map(|s| s.due_period.to_string()),
                raw_payload,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn payment_exists(&self, transaction_id: &str) -> ReconResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM payment WHERE transaction_id = ?1",
                params![transaction_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn get_payment(&self, transaction_id: &str) -> ReconResult<Option<PaymentRecord>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {PAYMENT_COLUMNS} FROM payment WHERE transaction_id = ?1"),
                params![transaction_id],
                Self::map_payment_raw,
            )
            .optional()?;
        raw.map(PaymentRaw::into_record).transpose()
    }

    /// Every payment, most recent first.
    pub fn all_payments(&self) -> ReconResult<Vec<PaymentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let raw = stmt
            .query_map([], Self::map_payment_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(PaymentRaw::into_record).collect()
    }

    /// The most recent payment recorded for a payer key — the source of a
    /// carried shortfall. Rowid breaks created_at ties from rapid inserts.
    pub fn latest_payment_for_payer(
        &self,
        payer_key: &PayerKey,
    ) -> ReconResult<Option<PaymentRecord>> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {PAYMENT_COLUMNS} FROM payment
                     WHERE payer_key = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT 1"
                ),
                params![payer_key.as_str()],
                Self::map_payment_raw,
            )
            .optional()?;
        raw.map(PaymentRaw::into_record).transpose()
    }

    pub fn payment_count(&self) -> ReconResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM payment", [], |row| row.get(0))?;
        Ok(count)
    }

    // ── Identity correction ────────────────────────────────────────

    /// Apply an administrator identity correction. This is the only update
    /// the payment table supports; monetary and allocation columns have no
    /// update path at all. Returns whether the record exists.
    pub fn update_payment_identity(
        &self,
        transaction_id: &str,
        correction: &IdentityCorrection,
    ) -> ReconResult<bool> {
        if correction.is_empty() {
            return self.payment_exists(transaction_id);
        }
        let changed = self.conn.execute(
            "UPDATE payment
             SET payer_name = COALESCE(?1, payer_name),
                 payer_key  = COALESCE(?2, payer_key)
             WHERE transaction_id = ?3",
            params![correction.name, correction.phone, transaction_id],
        )?;
        Ok(changed == 1)
    }

    pub fn delete_payment(&self, transaction_id: &str) -> ReconResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM payment WHERE transaction_id = ?1",
            params![transaction_id],
        )?;
        Ok(changed == 1)
    }

    fn map_payment_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaymentRaw> {
        Ok(PaymentRaw {
            transaction_id: row.get(0)?,
            plot_name: row.get(1)?,
            units: row.get::<_, Option<i64>>(2)?.map(|u| u as u32),
            mpesa_amount: row.get(3)?,
            cash_amount: row.get(4)?,
            total_amount: row.get(5)?,
            payer_key: row.get(6)?,
            payer_name: row.get(7)?,
            paid_at_display: row.get(8)?,
            source: row.get(9)?,
            allocations: row.get(10)?,
            statuses: row.get(11)?,
            less_amount: row.get(12)?,
            less_due_period: row.get(13)?,
            raw_payload: row.get(14)?,
            created_at: row.get(15)?,
        })
    }
}

/// Column-level image of a payment row; JSON, enum and timestamp decoding
/// happens outside the rusqlite mapping closure.
struct PaymentRaw {
    transaction_id: String,
    plot_name: String,
    units: Option<u32>,
    mpesa_amount: i64,
    cash_amount: i64,
    total_amount: i64,
    payer_key: String,
    payer_name: String,
    paid_at_display: String,
    source: String,
    allocations: String,
    statuses: String,
    less_amount: Option<i64>,
    less_due_period: Option<String>,
    raw_payload: Option<String>,
    created_at: String,
}

impl PaymentRaw {
    fn into_record(self) -> ReconResult<PaymentRecord> {
        let source =
            PaymentSource::from_db(&self.source).ok_or_else(|| ReconError::CorruptRecord {
                detail: format!(
                    "payment '{}' has unknown source '{}'",
                    self.transaction_id, self.source
                ),
            })?;
        let shortfall = match (self.less_amount, self.less_due_period) {
            (Some(amount), Some(period)) => Some(Shortfall {
                amount,
                due_period: period.parse()?,
            }),
            (None, None) => None,
            _ => {
                return Err(ReconError::CorruptRecord {
                    detail: format!(
                        "payment '{}' has a half-written shortfall",
                        self.transaction_id
                    ),
                })
            }
        };
        Ok(PaymentRecord {
            plot_name: self.plot_name,
            units: self.units,
            amount: AmountBreakdown {
                mpesa: self.mpesa_amount,
                cash: self.cash_amount,
                total: self.total_amount,
            },
            payer_key: PayerKey::new(self.payer_key),
            payer_name: self.payer_name,
            paid_at_display: self.paid_at_display,
            source,
            allocations: serde_json::from_str(&self.allocations)?,
            statuses: serde_json::from_str(&self.statuses)?,
            shortfall,
            raw_payload: self
                .raw_payload
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            created_at: parse_created_at(&self.created_at)?,
            transaction_id: self.transaction_id,
        })
    }
}

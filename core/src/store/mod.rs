//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The engine and resolver call store methods — they never execute SQL.

use crate::error::{ReconError, ReconResult};
use crate::plot::{Plot, PlotKind, Tenant};
use crate::types::PayerKey;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

mod payments;

pub struct ReconStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl ReconStore {
    pub fn open(path: &str) -> ReconResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ReconResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases this returns a fresh, isolated database.
    pub fn reopen(&self) -> ReconResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ReconResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Billing records ────────────────────────────────────────────

    pub fn insert_plot(&self, plot: &Plot) -> ReconResult<()> {
        let (payer_key, expected, payout, tenants_json) = match &plot.kind {
            PlotKind::Lumpsum {
                payer_key,
                expected_amount,
                payout_msisdn,
            } => (
                Some(payer_key.as_str().to_string()),
                Some(*expected_amount),
                payout_msisdn.clone(),
                "[]".to_string(),
            ),
            PlotKind::Individual { tenants } => {
                (None, None, None, serde_json::to_string(tenants)?)
            }
        };
        self.conn.execute(
            "INSERT INTO plot
             (plot_id, name, location, plot_type, units,
              payer_key, expected_amount, payout_msisdn, tenants, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                plot.id,
                plot.name,
                plot.location,
                plot.kind.type_str(),
                plot.units as i64,
                payer_key,
                expected,
                payout,
                tenants_json,
                plot.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All billing records in insertion order. The resolver's
    /// last-match-wins tie-break is defined against exactly this order.
    pub fn all_plots(&self) -> ReconResult<Vec<Plot>> {
        let mut stmt = self.conn.prepare(
            "SELECT plot_id, name, location, plot_type, units,
                    payer_key, expected_amount, payout_msisdn, tenants, created_at
             FROM plot
             ORDER BY rowid ASC",
        )?;
        let raw = stmt
            .query_map([], Self::map_plot_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(PlotRaw::into_plot).collect()
    }

    pub fn get_plot(&self, plot_id: &str) -> ReconResult<Option<Plot>> {
        let raw = self
            .conn
            .query_row(
                "SELECT plot_id, name, location, plot_type, units,
                        payer_key, expected_amount, payout_msisdn, tenants, created_at
                 FROM plot
                 WHERE plot_id = ?1",
                params![plot_id],
                Self::map_plot_raw,
            )
            .optional()?;
        raw.map(PlotRaw::into_plot).transpose()
    }

    pub fn delete_plot(&self, plot_id: &str) -> ReconResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM plot WHERE plot_id = ?1", params![plot_id])?;
        Ok(changed == 1)
    }

    pub fn plot_count(&self) -> ReconResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM plot", [], |row| row.get(0))?;
        Ok(count)
    }

    fn map_plot_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlotRaw> {
        Ok(PlotRaw {
            plot_id: row.get(0)?,
            name: row.get(1)?,
            location: row.get(2)?,
            plot_type: row.get(3)?,
            units: row.get::<_, i64>(4)? as u32,
            payer_key: row.get(5)?,
            expected_amount: row.get(6)?,
            payout_msisdn: row.get(7)?,
            tenants: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

/// Column-level image of a plot row; JSON and timestamp decoding happens
/// outside the rusqlite mapping closure so failures surface as ReconError.
struct PlotRaw {
    plot_id: String,
    name: String,
    location: Option<String>,
    plot_type: String,
    units: u32,
    payer_key: Option<String>,
    expected_amount: Option<i64>,
    payout_msisdn: Option<String>,
    tenants: String,
    created_at: String,
}

impl PlotRaw {
    fn into_plot(self) -> ReconResult<Plot> {
        let kind = match self.plot_type.as_str() {
            "lumpsum" => PlotKind::Lumpsum {
                payer_key: PayerKey::new(self.payer_key.ok_or_else(|| {
                    ReconError::CorruptRecord {
                        detail: format!("lumpsum plot '{}' has no payer_key", self.name),
                    }
                })?),
                expected_amount: self.expected_amount.ok_or_else(|| {
                    ReconError::CorruptRecord {
                        detail: format!("lumpsum plot '{}' has no expected_amount", self.name),
                    }
                })?,
                payout_msisdn: self.payout_msisdn,
            },
            "individual" => {
                let tenants: Vec<Tenant> = serde_json::from_str(&self.tenants)?;
                PlotKind::Individual { tenants }
            }
            other => {
                return Err(ReconError::CorruptRecord {
                    detail: format!("plot '{}' has unknown type '{}'", self.name, other),
                })
            }
        };
        Ok(Plot {
            id: self.plot_id,
            name: self.name,
            location: self.location,
            kind,
            units: self.units,
            created_at: parse_created_at(&self.created_at)?,
        })
    }
}

pub(crate) fn parse_created_at(raw: &str) -> ReconResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ReconError::CorruptRecord {
            detail: format!("unparseable created_at '{raw}'"),
        })
}

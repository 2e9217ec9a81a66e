//! Payer resolution — maps a hashed payer key to a billing record.
//!
//! Key uniqueness across records is a data-quality invariant, not something
//! storage enforces. When two records claim the same key, the LAST record in
//! scan order wins. That tie-break is inherited behaviour the rest of the
//! system depends on (shortfall continuity keys off the resolved identity),
//! so both the scan and the index preserve it.

use crate::plot::{Plot, PlotKind};
use crate::types::{Cents, PayerKey};
use std::collections::HashMap;

/// A successful match. `payer_key` is the record's canonical payout
/// identity, falling back to the key the payment arrived under when the
/// record carries no plaintext number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPayer {
    pub expected_amount: Cents,
    pub display_name: String,
    pub payer_key: PayerKey,
    pub plot_name: String,
    pub units: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Recognized(ResolvedPayer),
    Unrecognized,
}

impl Resolution {
    /// A match against a record with a non-positive expected amount cannot
    /// be allocated and must be handled as unrecognized.
    pub fn usable(&self) -> Option<&ResolvedPayer> {
        match self {
            Resolution::Recognized(p) if p.expected_amount > 0 => Some(p),
            _ => None,
        }
    }
}

fn resolve_in_plot(key: &PayerKey, plot: &Plot) -> Option<ResolvedPayer> {
    match &plot.kind {
        PlotKind::Lumpsum {
            payer_key,
            expected_amount,
            payout_msisdn,
        } if payer_key == key => Some(ResolvedPayer {
            expected_amount: *expected_amount,
            display_name: plot.name.clone(),
            payer_key: payout_msisdn
                .as_deref()
                .map(PayerKey::new)
                .unwrap_or_else(|| key.clone()),
            plot_name: plot.name.clone(),
            units: plot.units,
        }),
        PlotKind::Individual { tenants } => tenants
            .iter()
            .filter(|t| &t.payer_key == key)
            .last()
            .map(|t| ResolvedPayer {
                expected_amount: t.expected_amount,
                display_name: t.name.clone(),
                payer_key: t
                    .phone
                    .as_deref()
                    .map(PayerKey::new)
                    .unwrap_or_else(|| key.clone()),
                plot_name: plot.name.clone(),
                units: plot.units,
            }),
        _ => None,
    }
}

/// Linear scan over every billing record. O(records × tenants); the last
/// matching record in scan order wins.
pub fn resolve_scan(key: &PayerKey, plots: &[Plot]) -> Resolution {
    let mut found = None;
    for plot in plots {
        if let Some(resolved) = resolve_in_plot(key, plot) {
            found = Some(resolved);
        }
    }
    match found {
        Some(p) => Resolution::Recognized(p),
        None => Resolution::Unrecognized,
    }
}

/// Explicit payer-key → resolution map. Built by forward insertion so later
/// records overwrite earlier ones — the same tie-break as the scan.
#[derive(Debug, Default)]
pub struct PayerIndex {
    map: HashMap<PayerKey, ResolvedPayer>,
}

impl PayerIndex {
    pub fn build(plots: &[Plot]) -> Self {
        let mut map = HashMap::new();
        for plot in plots {
            match &plot.kind {
                PlotKind::Lumpsum { payer_key, .. } => {
                    if let Some(resolved) = resolve_in_plot(payer_key, plot) {
                        map.insert(payer_key.clone(), resolved);
                    }
                }
                PlotKind::Individual { tenants } => {
                    for tenant in tenants {
                        if let Some(resolved) = resolve_in_plot(&tenant.payer_key, plot) {
                            map.insert(tenant.payer_key.clone(), resolved);
                        }
                    }
                }
            }
        }
        Self { map }
    }

    pub fn resolve(&self, key: &PayerKey) -> Resolution {
        match self.map.get(key) {
            Some(p) => Resolution::Recognized(p.clone()),
            None => Resolution::Unrecognized,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

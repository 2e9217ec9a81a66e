//! Seed configuration — billing records loaded from JSON.
//!
//! Seed files carry plaintext phone numbers; conversion to `Plot`s
//! normalizes and hashes them so nothing downstream ever sees a raw
//! MSISDN as a payer key.

use crate::msisdn;
use crate::plot::{Plot, Tenant};
use crate::types::Cents;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSeed {
    pub name: String,
    pub phone: String,
    /// Expected per-period amount in cents.
    pub expected_cents: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotSeed {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    /// "lumpsum" or "individual".
    pub plot_type: String,
    #[serde(default)]
    pub units: Option<u32>,
    #[serde(default)]
    pub expected_cents: Option<Cents>,
    /// The paying phone number for a lumpsum plot.
    #[serde(default)]
    pub msisdn: Option<String>,
    /// Payout number, when it differs from the paying number.
    #[serde(default)]
    pub payout_msisdn: Option<String>,
    #[serde(default)]
    pub tenants: Vec<TenantSeed>,
}

#[derive(Debug, Clone, Deserialize)]
struct SeedFile {
    plots: Vec<PlotSeed>,
}

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub plots: Vec<PlotSeed>,
}

impl SeedConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
        let file: SeedFile = serde_json::from_str(&content)
            .with_context(|| format!("Cannot parse seed file {path}"))?;
        Ok(Self { plots: file.plots })
    }

    /// Fixture used in unit and integration tests: one lumpsum plot and one
    /// individual plot with two tenants.
    pub fn default_test() -> Self {
        Self {
            plots: vec![
                PlotSeed {
                    name: "Jowabu Court".into(),
                    location: Some("Kahawa West".into()),
                    plot_type: "lumpsum".into(),
                    units: Some(12),
                    expected_cents: Some(600_000),
                    msisdn: Some("0722000001".into()),
                    payout_msisdn: Some("254722000001".into()),
                    tenants: vec![],
                },
                PlotSeed {
                    name: "Green Villas".into(),
                    location: Some("Ruiru".into()),
                    plot_type: "individual".into(),
                    units: None,
                    expected_cents: None,
                    msisdn: None,
                    payout_msisdn: None,
                    tenants: vec![
                        TenantSeed {
                            name: "Wanjiku A.".into(),
                            phone: "0712345678".into(),
                            expected_cents: 100_000,
                        },
                        TenantSeed {
                            name: "Otieno B.".into(),
                            phone: "0733111222".into(),
                            expected_cents: 150_000,
                        },
                    ],
                },
            ],
        }
    }

    /// Validate each seed and build billing records, hashing every phone
    /// number on the way in.
    pub fn into_plots(self) -> anyhow::Result<Vec<Plot>> {
        self.plots.into_iter().map(build_plot).collect()
    }
}

fn build_plot(seed: PlotSeed) -> anyhow::Result<Plot> {
    let id = Uuid::new_v4().to_string();
    let mut plot = match seed.plot_type.as_str() {
        "lumpsum" => {
            let units = seed
                .units
                .with_context(|| format!("lumpsum plot '{}' needs units", seed.name))?;
            let expected = seed
                .expected_cents
                .with_context(|| format!("lumpsum plot '{}' needs expected_cents", seed.name))?;
            let msisdn = seed
                .msisdn
                .with_context(|| format!("lumpsum plot '{}' needs msisdn", seed.name))?;
            let normalized = msisdn::normalize(&msisdn);
            let payout = seed
                .payout_msisdn
                .map(|p| msisdn::normalize(&p))
                .or(Some(normalized.clone()));
            Plot::lumpsum(
                id,
                seed.name,
                units,
                msisdn::hash(&normalized),
                expected,
                payout,
            )
        }
        "individual" => {
            if seed.tenants.is_empty() {
                bail!("individual plot '{}' needs at least one tenant", seed.name);
            }
            let tenants = seed
                .tenants
                .into_iter()
                .map(|t| {
                    let normalized = msisdn::normalize(&t.phone);
                    Tenant {
                        name: t.name,
                        payer_key: msisdn::hash(&normalized),
                        phone: Some(normalized),
                        expected_amount: t.expected_cents,
                    }
                })
                .collect();
            Plot::individual(id, seed.name, tenants)
        }
        other => bail!("plot '{}' has unknown plot_type '{}'", seed.name, other),
    };
    if let Some(location) = seed.location {
        plot = plot.with_location(location);
    }
    Ok(plot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::PlotKind;

    #[test]
    fn default_test_seeds_build_valid_plots() {
        let plots = SeedConfig::default_test().into_plots().unwrap();
        assert_eq!(plots.len(), 2);
        match &plots[0].kind {
            PlotKind::Lumpsum {
                expected_amount,
                payout_msisdn,
                ..
            } => {
                assert_eq!(*expected_amount, 600_000);
                assert_eq!(payout_msisdn.as_deref(), Some("254722000001"));
            }
            other => panic!("expected lumpsum, got {other:?}"),
        }
        match &plots[1].kind {
            PlotKind::Individual { tenants } => {
                assert_eq!(tenants.len(), 2);
                assert_eq!(plots[1].units, 2);
            }
            other => panic!("expected individual, got {other:?}"),
        }
    }

    #[test]
    fn lumpsum_seed_missing_msisdn_is_rejected() {
        let seed = PlotSeed {
            name: "Broken".into(),
            location: None,
            plot_type: "lumpsum".into(),
            units: Some(4),
            expected_cents: Some(100_000),
            msisdn: None,
            payout_msisdn: None,
            tenants: vec![],
        };
        assert!(SeedConfig { plots: vec![seed] }.into_plots().is_err());
    }

    #[test]
    fn individual_seed_without_tenants_is_rejected() {
        let seed = PlotSeed {
            name: "Empty".into(),
            location: None,
            plot_type: "individual".into(),
            units: None,
            expected_cents: None,
            msisdn: None,
            payout_msisdn: None,
            tenants: vec![],
        };
        assert!(SeedConfig { plots: vec![seed] }.into_plots().is_err());
    }
}

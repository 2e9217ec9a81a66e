//! recon-runner: headless reconciliation replay tool.
//!
//! Seeds billing records from a JSON file and replays captured gateway
//! callback payloads through the reconciliation engine against a SQLite
//! database, then prints a run summary.
//!
//! Usage:
//!   recon-runner --db payments.db --seed plots.json \
//!       --stk stk_callback.json --c2b confirmation.json --list

use anyhow::{bail, Context, Result};
use plotpay_core::config::SeedConfig;
use plotpay_core::reconcile::{ReconEngine, ReconOutcome};
use plotpay_core::store::ReconStore;
use std::env;

enum Ingest {
    Stk(String),
    C2b(String),
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let seed = arg_value(&args, "--seed");
    let list = args.iter().any(|a| a == "--list");

    // Ingest files are replayed in the order given on the command line.
    let mut ingests = Vec::new();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--stk" | "--c2b" => {
                let Some(path) = args.get(i + 1) else {
                    bail!("{} needs a file argument", args[i]);
                };
                if args[i] == "--stk" {
                    ingests.push(Ingest::Stk(path.clone()));
                } else {
                    ingests.push(Ingest::C2b(path.clone()));
                }
                i += 2;
            }
            _ => i += 1,
        }
    }

    println!("plotpay — recon-runner");
    println!("  db:      {db}");
    println!("  seed:    {}", seed.unwrap_or("(none)"));
    println!("  replays: {}", ingests.len());
    println!();

    let store = ReconStore::open(db)?;
    store.migrate()?;
    let engine = ReconEngine::new(store);

    if let Some(seed_path) = seed {
        let plots = SeedConfig::load(seed_path)?.into_plots()?;
        for plot in &plots {
            engine.store().insert_plot(plot)?;
        }
        println!("seeded {} billing record(s)", plots.len());
    }

    for ingest in &ingests {
        let (kind, path) = match ingest {
            Ingest::Stk(p) => ("STK", p.as_str()),
            Ingest::C2b(p) => ("C2B", p.as_str()),
        };
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
        let payload: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("{path} is not valid JSON"))?;
        let outcome = match ingest {
            Ingest::Stk(_) => engine.reconcile_stk(&payload)?,
            Ingest::C2b(_) => engine.reconcile_c2b(&payload)?,
        };
        print_outcome(kind, path, &outcome);
    }

    println!();
    println!("── summary ─────────────────────────────────");
    println!("  billing records: {}", engine.store().plot_count()?);
    println!("  payment records: {}", engine.store().payment_count()?);

    if list {
        println!();
        for record in engine.store().all_payments()? {
            let shortfall = record
                .shortfall
                .as_ref()
                .map(|s| format!("{} due {}", cents(s.amount), s.due_period))
                .unwrap_or_else(|| "-".into());
            println!(
                "  {:<24} {:<16} {:>12}  {:<6} shortfall: {}",
                record.transaction_id,
                record.plot_name,
                cents(record.amount.total),
                record.source,
                shortfall,
            );
        }
    }

    Ok(())
}

fn print_outcome(kind: &str, path: &str, outcome: &ReconOutcome) {
    match outcome {
        ReconOutcome::Recorded(r) => println!(
            "{kind} {path}: recorded {} for {} ({} period(s))",
            cents(r.amount.total),
            r.payer_name,
            r.allocations.len()
        ),
        ReconOutcome::Unrecognized(r) => println!(
            "{kind} {path}: unrecognized payer, kept {} as Unknown",
            cents(r.amount.total)
        ),
        ReconOutcome::AlreadyRecorded => {
            println!("{kind} {path}: already reconciled, skipped")
        }
        ReconOutcome::Dropped(reason) => {
            println!("{kind} {path}: dropped ({reason:?})")
        }
    }
}

fn cents(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn print_usage() {
    println!("recon-runner — replay gateway callbacks through reconciliation");
    println!();
    println!("Options:");
    println!("  --db <path>     SQLite database (default :memory:)");
    println!("  --seed <path>   JSON seed file with billing records");
    println!("  --stk <path>    replay an STK callback payload (repeatable)");
    println!("  --c2b <path>    replay a C2B confirmation payload (repeatable)");
    println!("  --list          print every payment record after the run");
}

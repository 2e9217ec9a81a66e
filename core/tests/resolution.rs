//! Integration tests for payer resolution.
//!
//! Key uniqueness across billing records is a data-quality invariant, not
//! a storage guarantee — these tests pin the documented behaviour when it
//! is violated: the last record in scan order wins, in both the linear
//! scan and the index the engine actually uses.

use plotpay_core::msisdn;
use plotpay_core::plot::{Plot, Tenant};
use plotpay_core::resolver::{resolve_scan, PayerIndex, Resolution};
use plotpay_core::types::PayerKey;

fn key(phone: &str) -> PayerKey {
    msisdn::hash(&msisdn::normalize(phone))
}

fn tenant(name: &str, phone: &str, expected: i64) -> Tenant {
    Tenant {
        name: name.into(),
        phone: Some(msisdn::normalize(phone)),
        payer_key: key(phone),
        expected_amount: expected,
    }
}

fn fixture() -> Vec<Plot> {
    vec![
        Plot::lumpsum(
            "plot-1",
            "Jowabu Court",
            12,
            key("0722000001"),
            600_000,
            Some("254722000001".into()),
        ),
        Plot::individual(
            "plot-2",
            "Green Villas",
            vec![
                tenant("Wanjiku A.", "0712345678", 100_000),
                tenant("Otieno B.", "0733111222", 150_000),
            ],
        ),
    ]
}

#[test]
fn lumpsum_payer_resolves_to_the_plot() {
    let plots = fixture();
    match resolve_scan(&key("0722000001"), &plots) {
        Resolution::Recognized(p) => {
            assert_eq!(p.expected_amount, 600_000);
            assert_eq!(p.display_name, "Jowabu Court");
            assert_eq!(p.plot_name, "Jowabu Court");
            assert_eq!(p.units, 12);
            // Canonical identity is the payout number, not the hashed key.
            assert_eq!(p.payer_key.as_str(), "254722000001");
        }
        Resolution::Unrecognized => panic!("lumpsum payer should resolve"),
    }
}

#[test]
fn tenant_payer_resolves_to_their_own_terms() {
    let plots = fixture();
    match resolve_scan(&key("0733111222"), &plots) {
        Resolution::Recognized(p) => {
            assert_eq!(p.expected_amount, 150_000);
            assert_eq!(p.display_name, "Otieno B.");
            assert_eq!(p.plot_name, "Green Villas");
            assert_eq!(p.units, 2);
            assert_eq!(p.payer_key.as_str(), "254733111222");
        }
        Resolution::Unrecognized => panic!("tenant should resolve"),
    }
}

#[test]
fn unknown_key_is_unrecognized() {
    let plots = fixture();
    assert_eq!(
        resolve_scan(&key("0799999999"), &plots),
        Resolution::Unrecognized
    );
}

#[test]
fn missing_payout_number_falls_back_to_the_input_key() {
    let k = key("0711000000");
    let plots = vec![Plot::lumpsum(
        "plot-np",
        "No Payout Court",
        4,
        k.clone(),
        200_000,
        None,
    )];
    match resolve_scan(&k, &plots) {
        Resolution::Recognized(p) => assert_eq!(p.payer_key, k),
        Resolution::Unrecognized => panic!("should resolve"),
    }
}

#[test]
fn duplicate_key_across_records_last_match_wins() {
    let shared = key("0700000007");
    let plots = vec![
        Plot::lumpsum("plot-a", "First Court", 4, shared.clone(), 100_000, None),
        Plot::lumpsum("plot-b", "Second Court", 8, shared.clone(), 250_000, None),
    ];

    match resolve_scan(&shared, &plots) {
        Resolution::Recognized(p) => {
            assert_eq!(p.plot_name, "Second Court");
            assert_eq!(p.expected_amount, 250_000);
        }
        Resolution::Unrecognized => panic!("should resolve"),
    }
}

#[test]
fn duplicate_tenant_and_lumpsum_key_follows_scan_order() {
    let shared = key("0700000008");
    let plots = vec![
        Plot::lumpsum("plot-a", "Early Court", 2, shared.clone(), 100_000, None),
        Plot::individual(
            "plot-b",
            "Later Villas",
            vec![Tenant {
                name: "Shared K.".into(),
                phone: None,
                payer_key: shared.clone(),
                expected_amount: 50_000,
            }],
        ),
    ];

    match resolve_scan(&shared, &plots) {
        Resolution::Recognized(p) => {
            assert_eq!(p.plot_name, "Later Villas");
            assert_eq!(p.expected_amount, 50_000);
            // Tenant has no plaintext phone; fall back to the input key.
            assert_eq!(p.payer_key, shared);
        }
        Resolution::Unrecognized => panic!("should resolve"),
    }
}

#[test]
fn index_agrees_with_the_scan_including_tie_breaks() {
    let shared = key("0700000007");
    let mut plots = fixture();
    plots.push(Plot::lumpsum(
        "plot-a",
        "First Court",
        4,
        shared.clone(),
        100_000,
        None,
    ));
    plots.push(Plot::lumpsum(
        "plot-b",
        "Second Court",
        8,
        shared.clone(),
        250_000,
        None,
    ));

    let index = PayerIndex::build(&plots);
    for phone in ["0722000001", "0712345678", "0733111222", "0700000007", "0788"] {
        let k = key(phone);
        assert_eq!(
            index.resolve(&k),
            resolve_scan(&k, &plots),
            "index and scan diverged for {phone}"
        );
    }
    assert_eq!(index.len(), 4);
}

#[test]
fn zero_expected_amount_is_not_usable() {
    let k = key("0700000009");
    let plots = vec![Plot::lumpsum("plot-z", "Zero Court", 1, k.clone(), 0, None)];
    let resolution = resolve_scan(&k, &plots);
    assert!(matches!(resolution, Resolution::Recognized(_)));
    assert!(
        resolution.usable().is_none(),
        "zero expected amount must be handled as unrecognized"
    );
}

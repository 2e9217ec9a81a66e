//! One-way MSISDN hashing.
//!
//! Stored payer keys never retain the plaintext phone number. The hash is a
//! plain SHA-256 over the exact input bytes — no normalization happens here.
//! Call sites that derive keys from gateway payloads must run `normalize`
//! first so that `0712...` and `254712...` produce the same key.

use crate::types::PayerKey;
use sha2::{Digest, Sha256};

/// Kenyan country prefix substituted for a leading zero during
/// normalization.
const COUNTRY_PREFIX: &str = "254";

/// Deterministic one-way transform of a phone number into a payer key.
/// Same input, same output; the plaintext is not recoverable.
pub fn hash(raw: &str) -> PayerKey {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    PayerKey::new(hex::encode(hasher.finalize()))
}

/// Canonical form of a raw MSISDN: whitespace and a leading `+` stripped,
/// a leading zero replaced with the country prefix.
pub fn normalize(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '+')
        .collect();
    match stripped.strip_prefix('0') {
        Some(rest) => format!("{COUNTRY_PREFIX}{rest}"),
        None => stripped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash("254712345678"), hash("254712345678"));
        assert_ne!(hash("254712345678"), hash("254712345679"));
    }

    #[test]
    fn hash_matches_known_sha256_vector() {
        // FIPS 180-2 test vector for "abc".
        assert_eq!(
            hash("abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_does_not_normalize() {
        assert_ne!(hash("0712345678"), hash("254712345678"));
    }

    #[test]
    fn normalize_canonicalizes_common_forms() {
        assert_eq!(normalize("0712345678"), "254712345678");
        assert_eq!(normalize("+254712345678"), "254712345678");
        assert_eq!(normalize("254 712 345 678"), "254712345678");
        assert_eq!(normalize("254712345678"), "254712345678");
    }

    #[test]
    fn normalized_forms_hash_identically() {
        assert_eq!(
            hash(&normalize("0712345678")),
            hash(&normalize("+254712345678"))
        );
    }
}

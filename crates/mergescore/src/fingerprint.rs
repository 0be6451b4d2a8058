// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Content fingerprints for cache lookups
//!
//! A fingerprint is SHA-256 over a domain tag followed by each field as a
//! big-endian `u64` length and its bytes. Length prefixes keep field
//! boundaries unambiguous, so `("ab", "c")` and `("a", "bc")` never collide.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Domain separation tag; bump when the field layout changes
const DOMAIN: &[u8] = b"mergescore/fingerprint/v1";

/// Hex-encoded SHA-256 identifying one (merge, payload, model) combination
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Lowercase hex digest
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a digest read back from storage
    #[must_use]
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fingerprint of a merge identity, the payload sent to the scorer, and the model
#[must_use]
pub fn fingerprint(merge_identity: &str, payload: &str, model: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN);
    for field in [merge_identity, payload, model] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    Fingerprint(format!("{:x}", hasher.finalize()))
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: same inputs, same fingerprint
        #[test]
        fn prop_deterministic(id in ".*", payload in ".*", model in ".*") {
            prop_assert_eq!(fingerprint(&id, &payload, &model), fingerprint(&id, &payload, &model));
        }

        /// Property: moving a split point between identity and payload changes the digest
        #[test]
        fn prop_split_point_matters(text in ".{2,40}", at in any::<proptest::sample::Index>()) {
            let chars: Vec<char> = text.chars().collect();
            let split = at.index(chars.len() - 1) + 1;
            let left: String = chars[..split].iter().collect();
            let right: String = chars[split..].iter().collect();
            let shifted_left: String = chars[..split - 1].iter().collect();
            let shifted_right: String = chars[split - 1..].iter().collect();
            prop_assert_ne!(
                fingerprint(&left, &right, "m"),
                fingerprint(&shifted_left, &shifted_right, "m")
            );
        }

        /// Property: distinct payloads give distinct fingerprints
        #[test]
        fn prop_distinct_payloads(a in ".*", b in ".*") {
            prop_assume!(a != b);
            prop_assert_ne!(fingerprint("id", &a, "m"), fingerprint("id", &b, "m"));
        }
    }
}

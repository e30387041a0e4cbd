//! Fingerprint helpers for task inputs
//!
//! Fingerprint functions are supplied per task and are never validated by
//! the orchestrator. These helpers cover the two shapes used in practice:
//! hashing a serializable input, and using a scalar input's display form.

use crate::errors::{CacheError, Result};
use esoworker_core::Fingerprint;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Display;

/// Number of hex characters kept from the SHA-256 digest
const FINGERPRINT_LEN: usize = 32;

/// Fingerprint any serializable input.
///
/// The value is first converted to a `serde_json::Value`, whose object maps
/// are key-ordered, so two inputs that differ only in map iteration order
/// produce the same fingerprint.
pub fn json_fingerprint<T: Serialize + ?Sized>(input: &T) -> Result<Fingerprint> {
    let canonical =
        serde_json::to_value(input).map_err(|source| CacheError::Fingerprint { source })?;
    let bytes =
        serde_json::to_vec(&canonical).map_err(|source| CacheError::Fingerprint { source })?;

    let digest = Sha256::digest(&bytes);
    let mut encoded = hex::encode(digest);
    encoded.truncate(FINGERPRINT_LEN);
    Ok(Fingerprint::new(encoded))
}

/// Fingerprint an input by its display form
pub fn display_fingerprint<T: Display + ?Sized>(input: &T) -> Fingerprint {
    Fingerprint::new(input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct FightInput {
        report_code: String,
        fight_id: u32,
    }

    #[test]
    fn test_json_fingerprint_is_deterministic() {
        let a = FightInput {
            report_code: "abc".into(),
            fight_id: 16,
        };
        let b = FightInput {
            report_code: "abc".into(),
            fight_id: 16,
        };
        let fa = json_fingerprint(&a).unwrap();
        assert_eq!(fa, json_fingerprint(&b).unwrap());
        assert_eq!(fa.as_str().len(), FINGERPRINT_LEN);
    }

    #[test]
    fn test_json_fingerprint_differs_for_different_inputs() {
        let a = FightInput {
            report_code: "abc".into(),
            fight_id: 16,
        };
        let b = FightInput {
            report_code: "abc".into(),
            fight_id: 17,
        };
        assert_ne!(json_fingerprint(&a).unwrap(), json_fingerprint(&b).unwrap());
    }

    #[test]
    fn test_json_fingerprint_ignores_map_order() {
        let mut first = HashMap::new();
        let mut second = HashMap::new();
        for i in 0..32 {
            first.insert(format!("actor-{i}"), i);
        }
        for i in (0..32).rev() {
            second.insert(format!("actor-{i}"), i);
        }
        assert_eq!(
            json_fingerprint(&first).unwrap(),
            json_fingerprint(&second).unwrap()
        );
    }

    #[test]
    fn test_display_fingerprint() {
        assert_eq!(display_fingerprint(&4).as_str(), "4");
        assert_eq!(display_fingerprint("fight-16").as_str(), "fight-16");
    }
}

//! Content-hash identity for recommendations and identifier sources.

mod ids;

pub use ids::*;

use sha2::{Digest, Sha256};

/// Field separator in the canonical fingerprint preimage.
const FIELD_SEPARATOR: u8 = 0;

/// Compute SHA-256 hash of data.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Fingerprint a recommendation.
///
/// SHA-256 over `subject \0 drug \0 dosage \0 timestamp`, hex encoded.
/// Subject and drug names are hashed exactly as given.
pub fn fingerprint(subject_id: &str, drug_name: &str, dosage_mg: u32, timestamp_ms: i64) -> String {
    let dosage = dosage_mg.to_string();
    let timestamp = timestamp_ms.to_string();

    let mut hasher = Sha256::new();
    for (i, field) in [subject_id, drug_name, dosage.as_str(), timestamp.as_str()].iter().enumerate() {
        if i > 0 {
            hasher.update([FIELD_SEPARATOR]);
        }
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let data = b"test data";
        let hash1 = hash_data(data);
        let hash2 = hash_data(data);
        assert_eq!(hash1, hash2);

        // SHA-256 produces 64 hex characters
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_fingerprint_matches_canonical_preimage() {
        let fp = fingerprint("patient-abc", "ibuprofen", 400, 1_700_000_000_000);
        let expected = hash_data(b"patient-abc\0ibuprofen\0400\01700000000000");
        assert_eq!(fp, expected);
        assert_eq!(fp.len(), 64);
    }

    #[test]
    fn test_fingerprint_field_boundaries() {
        // Shifting characters across a field boundary must change the hash
        let a = fingerprint("patient-a", "bibuprofen", 400, 1);
        let b = fingerprint("patient-ab", "ibuprofen", 400, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_sensitive_to_each_field() {
        let base = fingerprint("p1", "ibuprofen", 400, 1000);
        assert_ne!(base, fingerprint("p2", "ibuprofen", 400, 1000));
        assert_ne!(base, fingerprint("p1", "naproxen", 400, 1000));
        assert_ne!(base, fingerprint("p1", "ibuprofen", 405, 1000));
        assert_ne!(base, fingerprint("p1", "ibuprofen", 400, 1001));
    }
}

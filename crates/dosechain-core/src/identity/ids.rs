//! Identifier sources for subject and entry ids.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SUBJECT_PREFIX: &str = "patient-";
const ENTRY_PREFIX: &str = "pred_";
const SUBJECT_SUFFIX_LEN: usize = 13;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Source of identifiers. Injected so tests can reproduce exact ids.
pub trait IdSource: Send {
    /// Next 64 random bits.
    fn next_u64(&mut self) -> u64;

    /// A new subject id (`patient-` followed by 13 base-36 chars).
    fn subject_id(&mut self) -> String {
        format!("{}{}", SUBJECT_PREFIX, to_base36(self.next_u64(), SUBJECT_SUFFIX_LEN))
    }

    /// A new ledger entry id (`pred_` followed by 16 hex chars).
    fn entry_id(&mut self) -> String {
        format!("{}{:016x}", ENTRY_PREFIX, self.next_u64())
    }
}

/// Entropy-backed ids (UUID v4 bits).
#[derive(Debug, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_u64(&mut self) -> u64 {
        uuid::Uuid::new_v4().as_u128() as u64
    }
}

/// Reproducible ids from a seeded generator.
#[derive(Debug)]
pub struct SeededIds {
    rng: StdRng,
}

impl SeededIds {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl IdSource for SeededIds {
    fn next_u64(&mut self) -> u64 {
        self.rng.gen()
    }
}

/// Zero-padded base-36 rendering, most significant digit first.
fn to_base36(mut value: u64, width: usize) -> String {
    let mut digits = Vec::with_capacity(width);
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    while digits.len() < width {
        digits.push(b'0');
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0, 3), "000");
        assert_eq!(to_base36(35, 2), "0z");
        assert_eq!(to_base36(36, 2), "10");
        assert_eq!(to_base36(u64::MAX, 13).len(), 13);
    }

    #[test]
    fn test_seeded_ids_reproducible() {
        let mut a = SeededIds::new(42);
        let mut b = SeededIds::new(42);
        assert_eq!(a.entry_id(), b.entry_id());
        assert_eq!(a.subject_id(), b.subject_id());

        let mut c = SeededIds::new(43);
        assert_ne!(SeededIds::new(42).entry_id(), c.entry_id());
    }

    #[test]
    fn test_id_formats() {
        let mut ids = RandomIds;
        let subject = ids.subject_id();
        assert!(subject.starts_with("patient-"));
        assert_eq!(subject.len(), "patient-".len() + 13);

        let entry = ids.entry_id();
        assert!(entry.starts_with("pred_"));
        assert_eq!(entry.len(), "pred_".len() + 16);
        assert_ne!(entry, ids.entry_id());
    }
}

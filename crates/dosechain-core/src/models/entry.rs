//! Ledger entry models.

use serde::{Deserialize, Serialize};

use super::{DosageRecommendation, DosageRequest};

/// Commit status of a ledger entry.
///
/// Only `Committed` entries are ever stored; `Failed` exists for callers
/// that display the outcome of a rejected attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Committed,
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Committed => "committed",
            EntryStatus::Failed => "failed",
        }
    }
}

/// An immutable, committed prediction record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    /// Primary key (distinct from the fingerprint)
    pub entry_id: String,
    pub subject_id: String,
    pub drug_name: String,
    /// Dosage as displayed ("400 mg")
    pub dosage_display: String,
    /// Content hash of (subject, drug, dosage, timestamp)
    pub fingerprint: String,
    /// Opaque reference returned by the commit
    pub transaction_ref: String,
    pub status: EntryStatus,
    pub recommendation: DosageRecommendation,
    /// Originating request, with the subject id resolved
    pub request: DosageRequest,
    /// RFC 3339 commit time
    pub committed_at: String,
}

impl LedgerEntry {
    pub fn confidence(&self) -> f64 {
        self.recommendation.confidence
    }

    /// Serialize to canonical JSON for journaling and reports.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

//! Inclusion proofs and exportable verification reports.

use serde::{Deserialize, Serialize};

use crate::models::LedgerEntry;

/// Hash algorithm named in exported reports.
pub const PROOF_ALGORITHM: &str = "SHA-256";

/// Report format version.
pub const REPORT_FORMAT_VERSION: &str = "1.0";

/// Which side of the running hash a sibling sits on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// One level of an audit path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: String,
    pub side: Side,
}

/// Merkle inclusion proof for one fingerprint, leaf to root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf_hash: String,
    /// Root the path resolves to when the proof was generated
    pub root_hash: String,
    pub leaf_index: usize,
    pub path: Vec<ProofStep>,
}

impl MerkleProof {
    /// Number of hashing steps from leaf to root.
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Report metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportMetadata {
    pub exported_at: String,
    pub format_version: String,
    pub algorithm: String,
    /// Whether the fingerprint recomputed from the entry matched
    pub fingerprint_verified: bool,
}

/// Everything an external party needs to re-verify one prediction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationReport {
    pub metadata: ReportMetadata,
    pub entry: LedgerEntry,
    pub proof: MerkleProof,
}

impl VerificationReport {
    pub fn new(entry: LedgerEntry, proof: MerkleProof, fingerprint_verified: bool) -> Self {
        Self {
            metadata: ReportMetadata {
                exported_at: chrono::Utc::now().to_rfc3339(),
                format_version: REPORT_FORMAT_VERSION.to_string(),
                algorithm: PROOF_ALGORITHM.to_string(),
                fingerprint_verified,
            },
            entry,
            proof,
        }
    }

    /// Pretty JSON for export.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

//! Commit simulator implementation.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::CommitConfig;
use crate::identity::hash_data;

/// Reasons a simulated commit can be rejected.
const FAILURE_REASONS: &[&str] = &[
    "network timeout while awaiting confirmation",
    "transaction dropped from mempool",
    "insufficient gas for transaction",
];

/// Progress of a commit, reported through a [`StatusSink`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CommitStatus {
    /// Fingerprint handed to the store
    Submitted { fingerprint: String },
    /// Store acknowledged, awaiting confirmation
    Pending { fingerprint: String },
    Confirmed { transaction_ref: String },
    Rejected { reason: String },
}

impl CommitStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommitStatus::Confirmed { .. } | CommitStatus::Rejected { .. })
    }
}

impl fmt::Display for CommitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitStatus::Submitted { .. } => f.write_str("Submitting transaction..."),
            CommitStatus::Pending { .. } => f.write_str("Waiting for confirmation..."),
            CommitStatus::Confirmed { transaction_ref } => {
                write!(f, "Transaction confirmed: {}", transaction_ref)
            }
            CommitStatus::Rejected { reason } => write!(f, "Transaction failed: {}", reason),
        }
    }
}

/// Advisory progress channel. Notifications are dropped when it is full.
pub type StatusSink = mpsc::Sender<CommitStatus>;

/// A successful commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommitReceipt {
    /// Opaque transaction reference (never equal to the fingerprint)
    pub transaction_ref: String,
    pub fingerprint: String,
    /// RFC 3339 confirmation time
    pub confirmed_at: String,
}

/// A failed commit. Nothing was written; retrying is safe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Commit failed: {reason}")]
pub struct CommitFailure {
    pub reason: String,
}

impl CommitFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type CommitResult = Result<CommitReceipt, CommitFailure>;

/// Simulates the submit/confirm cycle of a write-once external ledger.
pub struct CommitSimulator {
    config: CommitConfig,
    rng: Mutex<StdRng>,
}

impl CommitSimulator {
    /// Create a simulator. A configured seed makes outcomes reproducible.
    pub fn new(config: CommitConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &CommitConfig {
        &self.config
    }

    /// Commit a fingerprint with its recommendation metadata.
    ///
    /// Dropping the returned future abandons the commit without side effects.
    pub async fn commit(
        &self,
        fingerprint: &str,
        drug_name: &str,
        dosage_mg: u32,
        timestamp_ms: i64,
        sink: Option<&StatusSink>,
    ) -> CommitResult {
        if fingerprint.is_empty() {
            return Err(CommitFailure::new("missing fingerprint"));
        }

        debug!(fingerprint, drug = drug_name, dosage_mg, timestamp_ms, "Submitting commit");
        notify(
            sink,
            CommitStatus::Submitted {
                fingerprint: fingerprint.to_string(),
            },
        );
        tokio::time::sleep(Duration::from_millis(self.config.submit_latency_ms)).await;

        // Draw the outcome up front so the lock is never held across an await
        let (fails, nonce, reason_index) = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let roll: f64 = rng.gen();
            (
                roll < self.config.failure_rate,
                rng.gen::<u64>(),
                rng.gen_range(0..FAILURE_REASONS.len()),
            )
        };

        notify(
            sink,
            CommitStatus::Pending {
                fingerprint: fingerprint.to_string(),
            },
        );
        tokio::time::sleep(Duration::from_millis(self.config.confirm_latency_ms)).await;

        if fails {
            let reason = FAILURE_REASONS[reason_index].to_string();
            warn!(fingerprint, %reason, "Simulated commit rejected");
            notify(
                sink,
                CommitStatus::Rejected {
                    reason: reason.clone(),
                },
            );
            return Err(CommitFailure { reason });
        }

        let transaction_ref = transaction_ref(fingerprint, nonce);
        info!(fingerprint, transaction_ref = %transaction_ref, "Simulated commit confirmed");
        notify(
            sink,
            CommitStatus::Confirmed {
                transaction_ref: transaction_ref.clone(),
            },
        );

        Ok(CommitReceipt {
            transaction_ref,
            fingerprint: fingerprint.to_string(),
            confirmed_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// `0x`-prefixed hash of the fingerprint and a nonce.
fn transaction_ref(fingerprint: &str, nonce: u64) -> String {
    let mut preimage = fingerprint.as_bytes().to_vec();
    preimage.extend_from_slice(&nonce.to_be_bytes());
    format!("0x{}", hash_data(&preimage))
}

fn notify(sink: Option<&StatusSink>, status: CommitStatus) {
    if let Some(sink) = sink {
        if let Err(e) = sink.try_send(status) {
            debug!(error = %e, "Dropped commit status notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FP: &str = "5f2b1c0e9d8a7b6c5f2b1c0e9d8a7b6c5f2b1c0e9d8a7b6c5f2b1c0e9d8a7b6c";

    fn drain(rx: &mut mpsc::Receiver<CommitStatus>) -> Vec<CommitStatus> {
        let mut statuses = Vec::new();
        while let Ok(status) = rx.try_recv() {
            statuses.push(status);
        }
        statuses
    }

    #[tokio::test]
    async fn test_commit_success_reports_progress() {
        let simulator = CommitSimulator::new(CommitConfig::instant(1));
        let (tx, mut rx) = mpsc::channel(8);

        let receipt = simulator
            .commit(FP, "ibuprofen", 400, 1_700_000_000_000, Some(&tx))
            .await
            .unwrap();

        assert!(receipt.transaction_ref.starts_with("0x"));
        assert_ne!(receipt.transaction_ref, receipt.fingerprint);
        assert_eq!(receipt.fingerprint, FP);

        let statuses = drain(&mut rx);
        assert_eq!(statuses.len(), 3);
        assert!(matches!(statuses[0], CommitStatus::Submitted { .. }));
        assert!(matches!(statuses[1], CommitStatus::Pending { .. }));
        assert_eq!(
            statuses[2],
            CommitStatus::Confirmed {
                transaction_ref: receipt.transaction_ref.clone()
            }
        );
    }

    #[tokio::test]
    async fn test_commit_failure_is_explicit() {
        let simulator = CommitSimulator::new(CommitConfig::always_failing(1));
        let (tx, mut rx) = mpsc::channel(8);

        let failure = simulator
            .commit(FP, "ibuprofen", 400, 0, Some(&tx))
            .await
            .unwrap_err();

        assert!(FAILURE_REASONS.contains(&failure.reason.as_str()));
        let statuses = drain(&mut rx);
        assert!(statuses.last().unwrap().is_terminal());
        assert!(matches!(statuses.last(), Some(CommitStatus::Rejected { .. })));
    }

    #[tokio::test]
    async fn test_seeded_refs_reproducible() {
        let a = CommitSimulator::new(CommitConfig::instant(9));
        let b = CommitSimulator::new(CommitConfig::instant(9));

        let ra = a.commit(FP, "ibuprofen", 400, 0, None).await.unwrap();
        let rb = b.commit(FP, "ibuprofen", 400, 0, None).await.unwrap();
        assert_eq!(ra.transaction_ref, rb.transaction_ref);

        // Retrying the same fingerprint yields a fresh reference
        let ra2 = a.commit(FP, "ibuprofen", 400, 0, None).await.unwrap();
        assert_ne!(ra.transaction_ref, ra2.transaction_ref);
    }

    #[tokio::test]
    async fn test_empty_fingerprint_fails() {
        let simulator = CommitSimulator::new(CommitConfig::instant(1));
        let failure = simulator.commit("", "ibuprofen", 400, 0, None).await.unwrap_err();
        assert_eq!(failure.reason, "missing fingerprint");
    }

    #[tokio::test]
    async fn test_full_sink_does_not_block() {
        let simulator = CommitSimulator::new(CommitConfig::instant(1));
        let (tx, mut rx) = mpsc::channel(1);

        simulator.commit(FP, "ibuprofen", 400, 0, Some(&tx)).await.unwrap();

        // Only the first notification fit; the rest were dropped
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_simulated() {
        let config = CommitConfig {
            submit_latency_ms: 300,
            confirm_latency_ms: 700,
            failure_rate: 0.0,
            seed: Some(3),
        };
        let simulator = CommitSimulator::new(config);

        let start = tokio::time::Instant::now();
        simulator.commit(FP, "ibuprofen", 400, 0, None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}

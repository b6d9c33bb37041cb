//! Prediction ledger: the append-only system of record.
//!
//! ```text
//! record(request, recommendation)
//!        │
//!        ├─ resolve subject id, fingerprint, reject known fingerprint
//!        │
//!        ├─ commit simulator ── Failure ──▶ CommitFailure (ledger untouched)
//!        │
//!        └─ Success ──▶ persist hook ── Err ──▶ Persist (ledger untouched)
//!                            │
//!                            └─ Ok ──▶ append entry + id index + hash index
//!                                      + audit leaf (one write lock)
//! ```
//!
//! `record` is the only mutator and is serialized per ledger. Reads are
//! synchronous and always see whole entries.

mod search;
mod stats;

pub use search::*;
pub use stats::*;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::commit::{CommitFailure, CommitSimulator, CommitStatus, StatusSink};
use crate::config::{ConfigError, LedgerConfig};
use crate::engine::DosageEngine;
use crate::identity::{fingerprint, IdSource, RandomIds, SeededIds};
use crate::merkle::{verify_proof, AuditError, AuditTree, MerkleProof, TreeStats, VerificationReport};
use crate::models::{DosageRecommendation, DosageRequest, EntryStatus, LedgerEntry};

/// Ledger errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Commit(#[from] CommitFailure),

    #[error("Fingerprint {fingerprint} is already recorded as entry {existing_id}")]
    DuplicateFingerprint {
        fingerprint: String,
        existing_id: String,
    },

    #[error("Entry id already in use: {0}")]
    DuplicateId(String),

    #[error("Fingerprint does not match contents of entry {entry_id}")]
    FingerprintMismatch { entry_id: String },

    #[error("Entry {0} is not committed")]
    NotCommitted(String),

    #[error("Persisting entry failed: {0}")]
    Persist(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Audit tree error: {0}")]
    Audit(#[from] AuditError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl LedgerError {
    /// Whether calling `record` again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Commit(_) | LedgerError::Persist(_))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result of re-verifying a recorded fingerprint.
#[derive(Debug, Clone)]
pub struct Verification {
    pub entry: Arc<LedgerEntry>,
    /// Fingerprint recomputed from the entry's own fields matches
    pub fingerprint_matches: bool,
    /// Inclusion proof against the current audit root
    pub proof: MerkleProof,
    pub proof_valid: bool,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        self.fingerprint_matches && self.proof_valid
    }

    pub fn root_hash(&self) -> &str {
        &self.proof.root_hash
    }

    pub fn to_report(&self) -> VerificationReport {
        VerificationReport::new((*self.entry).clone(), self.proof.clone(), self.fingerprint_matches)
    }
}

/// Entries, both indices and the audit tree. Mutated only as a unit.
#[derive(Default)]
struct LedgerState {
    entries: Vec<Arc<LedgerEntry>>,
    by_id: HashMap<String, usize>,
    by_fingerprint: HashMap<String, usize>,
    audit: AuditTree,
}

impl LedgerState {
    fn check_unique(&self, entry_id: &str, fingerprint: &str) -> LedgerResult<()> {
        if let Some(&i) = self.by_fingerprint.get(fingerprint) {
            return Err(LedgerError::DuplicateFingerprint {
                fingerprint: fingerprint.to_string(),
                existing_id: self.entries[i].entry_id.clone(),
            });
        }
        if self.by_id.contains_key(entry_id) {
            return Err(LedgerError::DuplicateId(entry_id.to_string()));
        }
        Ok(())
    }

    /// Append an entry. On error nothing has changed.
    fn insert(&mut self, entry: LedgerEntry) -> LedgerResult<Arc<LedgerEntry>> {
        self.check_unique(&entry.entry_id, &entry.fingerprint)?;
        self.audit.append(&entry.fingerprint)?;

        let index = self.entries.len();
        let entry = Arc::new(entry);
        self.by_id.insert(entry.entry_id.clone(), index);
        self.by_fingerprint.insert(entry.fingerprint.clone(), index);
        self.entries.push(Arc::clone(&entry));
        Ok(entry)
    }
}

/// The authoritative store of committed predictions.
///
/// Share it across tasks with an `Arc`; there is no global instance.
pub struct PredictionLedger {
    state: RwLock<LedgerState>,
    /// Serializes `record` and owns id generation
    writer: Mutex<Box<dyn IdSource>>,
    committer: CommitSimulator,
    engine: DosageEngine,
    config: LedgerConfig,
}

impl PredictionLedger {
    /// Create an empty ledger. Ids are seeded when `config.id_seed` is set.
    pub fn new(config: LedgerConfig) -> LedgerResult<Self> {
        let ids: Box<dyn IdSource> = match config.id_seed {
            Some(seed) => Box::new(SeededIds::new(seed)),
            None => Box::new(RandomIds),
        };
        Self::with_id_source(config, ids)
    }

    /// Create an empty ledger with an explicit id source.
    pub fn with_id_source(config: LedgerConfig, ids: Box<dyn IdSource>) -> LedgerResult<Self> {
        config.validate()?;
        Ok(Self {
            state: RwLock::new(LedgerState::default()),
            writer: Mutex::new(ids),
            committer: CommitSimulator::new(config.commit.clone()),
            engine: DosageEngine::new(),
            config,
        })
    }

    /// Rebuild a ledger by replaying previously committed entries in order.
    pub fn restore<I>(config: LedgerConfig, entries: I) -> LedgerResult<Self>
    where
        I: IntoIterator<Item = LedgerEntry>,
    {
        let ledger = Self::new(config)?;
        {
            let mut state = ledger.write_state();
            for entry in entries {
                if entry.status != EntryStatus::Committed {
                    return Err(LedgerError::NotCommitted(entry.entry_id));
                }
                if !fingerprint_matches(&entry) {
                    return Err(LedgerError::FingerprintMismatch {
                        entry_id: entry.entry_id,
                    });
                }
                state.insert(entry)?;
            }
            debug!(entries = state.entries.len(), "Restored prediction ledger");
        }
        Ok(ledger)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// A progress channel sized by `status_buffer`.
    pub fn status_channel(&self) -> (StatusSink, mpsc::Receiver<CommitStatus>) {
        mpsc::channel(self.config.status_buffer)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Commit a recommendation and append it to the ledger.
    ///
    /// Assigns a subject id when the request has none. On any error the
    /// ledger is left exactly as it was, and dropping the future before it
    /// completes has the same effect.
    pub async fn record(
        &self,
        request: DosageRequest,
        recommendation: DosageRecommendation,
        sink: Option<&StatusSink>,
    ) -> LedgerResult<Arc<LedgerEntry>> {
        self.record_with(request, recommendation, sink, |_| {
            Ok::<(), std::convert::Infallible>(())
        })
        .await
    }

    /// Like [`record`](Self::record), but hands the committed entry to
    /// `persist` before it becomes visible.
    ///
    /// If `persist` fails the entry is not appended and the error is
    /// returned as [`LedgerError::Persist`].
    pub async fn record_with<F, E>(
        &self,
        mut request: DosageRequest,
        recommendation: DosageRecommendation,
        sink: Option<&StatusSink>,
        persist: F,
    ) -> LedgerResult<Arc<LedgerEntry>>
    where
        F: FnOnce(&LedgerEntry) -> Result<(), E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut ids = self.writer.lock().await;

        let subject_id = match request.subject_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => ids.subject_id(),
        };
        request.subject_id = Some(subject_id.clone());

        let fingerprint = fingerprint(
            &subject_id,
            &request.drug_name,
            recommendation.dosage_mg,
            recommendation.created_at_ms,
        );
        // A replayed ledger may already hold ids from the same seed
        let mut entry_id = ids.entry_id();
        while self.read_state().by_id.contains_key(&entry_id) {
            debug!(entry_id = %entry_id, "Entry id in use, drawing another");
            entry_id = ids.entry_id();
        }

        // Reject anomalies before anything is sent to the store
        if let Err(e) = self.read_state().check_unique(&entry_id, &fingerprint) {
            warn!(entry_id = %entry_id, fingerprint = %fingerprint, error = %e, "Rejected prediction");
            return Err(e);
        }

        let receipt = match self
            .committer
            .commit(
                &fingerprint,
                &request.drug_name,
                recommendation.dosage_mg,
                recommendation.created_at_ms,
                sink,
            )
            .await
        {
            Ok(receipt) => receipt,
            Err(failure) => {
                warn!(fingerprint = %fingerprint, reason = %failure.reason, "Commit failed; ledger unchanged");
                return Err(failure.into());
            }
        };

        let entry = LedgerEntry {
            entry_id,
            subject_id,
            drug_name: request.drug_name.clone(),
            dosage_display: recommendation.dosage_display(),
            fingerprint,
            transaction_ref: receipt.transaction_ref,
            status: EntryStatus::Committed,
            recommendation,
            request,
            committed_at: receipt.confirmed_at,
        };

        if let Err(e) = persist(&entry) {
            warn!(entry_id = %entry.entry_id, fingerprint = %entry.fingerprint, error = %e, "Persisting entry failed; ledger unchanged");
            return Err(LedgerError::Persist(Box::new(e)));
        }

        let entry = self.write_state().insert(entry)?;
        info!(
            entry_id = %entry.entry_id,
            fingerprint = %entry.fingerprint,
            drug = %entry.drug_name,
            transaction_ref = %entry.transaction_ref,
            "Recorded prediction"
        );
        Ok(entry)
    }

    /// Compute a recommendation for the request and record it.
    pub async fn predict(
        &self,
        request: DosageRequest,
        sink: Option<&StatusSink>,
    ) -> LedgerResult<Arc<LedgerEntry>> {
        let recommendation = self.engine.compute_recommendation(&request);
        self.record(request, recommendation, sink).await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get_by_id(&self, entry_id: &str) -> Option<Arc<LedgerEntry>> {
        let state = self.read_state();
        state
            .by_id
            .get(entry_id)
            .map(|&i| Arc::clone(&state.entries[i]))
    }

    pub fn get_by_hash(&self, fingerprint: &str) -> Option<Arc<LedgerEntry>> {
        let state = self.read_state();
        state
            .by_fingerprint
            .get(fingerprint)
            .map(|&i| Arc::clone(&state.entries[i]))
    }

    /// Case-insensitive substring search over subject id, drug name and
    /// entry id, in insertion order.
    pub fn search(&self, query: &str) -> SearchResults {
        SearchResults::new(self.entries(), query)
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<Arc<LedgerEntry>> {
        self.read_state().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn aggregate(&self) -> LedgerStats {
        aggregate(&self.read_state().entries)
    }

    pub fn audit_stats(&self) -> TreeStats {
        self.read_state().audit.stats()
    }

    /// Re-verify a fingerprint: entry lookup, fingerprint recomputation and
    /// an inclusion proof, all from one snapshot.
    pub fn verify(&self, fingerprint: &str) -> LedgerResult<Option<Verification>> {
        let state = self.read_state();
        let Some(&index) = state.by_fingerprint.get(fingerprint) else {
            return Ok(None);
        };
        let entry = Arc::clone(&state.entries[index]);
        let proof = state.audit.generate_proof(fingerprint)?;

        Ok(Some(Verification {
            fingerprint_matches: fingerprint_matches(&entry) && entry.fingerprint == fingerprint,
            proof_valid: verify_proof(&proof),
            proof,
            entry,
        }))
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        // Mutations validate before touching state, so a poisoned lock
        // still guards a consistent ledger
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Recompute an entry's fingerprint from its own fields.
pub fn fingerprint_matches(entry: &LedgerEntry) -> bool {
    fingerprint(
        &entry.subject_id,
        &entry.drug_name,
        entry.recommendation.dosage_mg,
        entry.recommendation.created_at_ms,
    ) == entry.fingerprint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommitConfig;
    use crate::models::Gender;

    fn ledger() -> PredictionLedger {
        PredictionLedger::new(LedgerConfig::deterministic(11)).unwrap()
    }

    fn request(subject: &str, drug: &str, ts: i64) -> DosageRequest {
        DosageRequest::new(30.0, 70.0, 170.0, Gender::Male, drug)
            .with_subject_id(subject)
            .with_timestamp(ts)
    }

    #[tokio::test]
    async fn test_record_indexes_both_keys() {
        let ledger = ledger();
        let entry = ledger.predict(request("patient-abc", "ibuprofen", 1), None).await.unwrap();

        assert_eq!(entry.status, EntryStatus::Committed);
        assert_eq!(entry.dosage_display, "400 mg");
        assert_eq!(ledger.get_by_id(&entry.entry_id).unwrap(), entry);
        assert_eq!(ledger.get_by_hash(&entry.fingerprint).unwrap(), entry);
        assert_ne!(entry.entry_id, entry.fingerprint);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_assigns_subject_id() {
        let ledger = ledger();
        let mut req = request("", "ibuprofen", 1);
        req.subject_id = None;

        let entry = ledger.predict(req, None).await.unwrap();
        assert!(entry.subject_id.starts_with("patient-"));
        assert_eq!(entry.request.subject_id.as_deref(), Some(entry.subject_id.as_str()));
        assert!(fingerprint_matches(&entry));
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_ledger_unchanged() {
        let config = LedgerConfig {
            commit: CommitConfig::always_failing(5),
            ..LedgerConfig::deterministic(5)
        };
        let ledger = PredictionLedger::new(config).unwrap();

        let err = ledger.predict(request("p1", "ibuprofen", 1), None).await.unwrap_err();
        assert!(matches!(err, LedgerError::Commit(_)));
        assert!(err.is_retryable());
        assert!(ledger.is_empty());
        assert_eq!(ledger.audit_stats().leaf_count, 0);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("store offline")]
    struct StoreOffline;

    #[tokio::test]
    async fn test_failed_persist_leaves_ledger_unchanged() {
        let ledger = ledger();
        let engine = DosageEngine::new();
        let req = request("p1", "ibuprofen", 1);
        let rec = engine.compute_recommendation(&req);

        let err = ledger
            .record_with(req.clone(), rec.clone(), None, |_| Err(StoreOffline))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Persist(_)));
        assert!(err.is_retryable());
        assert!(ledger.is_empty());
        assert_eq!(ledger.audit_stats().leaf_count, 0);

        let mut persisted = Vec::new();
        let entry = ledger
            .record_with(req, rec, None, |e| {
                persisted.push(e.fingerprint.clone());
                Ok::<(), StoreOffline>(())
            })
            .await
            .unwrap();
        assert_eq!(persisted, vec![entry.fingerprint.clone()]);
        assert_eq!(ledger.get_by_hash(&entry.fingerprint).unwrap(), entry);
        assert_eq!(ledger.audit_stats().leaf_count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_fingerprint_rejected() {
        let ledger = ledger();
        let first = ledger.predict(request("p1", "ibuprofen", 1), None).await.unwrap();

        let err = ledger.predict(request("p1", "ibuprofen", 1), None).await.unwrap_err();
        match err {
            LedgerError::DuplicateFingerprint {
                fingerprint,
                existing_id,
            } => {
                assert_eq!(fingerprint, first.fingerprint);
                assert_eq!(existing_id, first.entry_id);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_verify_round() {
        let ledger = ledger();
        let entry = ledger.predict(request("p1", "ibuprofen", 1), None).await.unwrap();
        ledger.predict(request("p2", "amoxicillin", 2), None).await.unwrap();

        let verification = ledger.verify(&entry.fingerprint).unwrap().unwrap();
        assert!(verification.is_valid());
        assert_eq!(Some(verification.root_hash()), ledger.audit_stats().root_hash.as_deref());

        assert!(ledger.verify("deadbeef").unwrap().is_none());
    }

    #[test]
    fn test_restore_rejects_tampered_entry() {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let ledger = ledger();
        let entry = rt
            .block_on(ledger.predict(request("p1", "ibuprofen", 1), None))
            .unwrap();

        let mut tampered = (*entry).clone();
        tampered.recommendation.dosage_mg = 800;

        let result = PredictionLedger::restore(LedgerConfig::deterministic(1), vec![tampered]);
        assert!(matches!(result, Err(LedgerError::FingerprintMismatch { .. })));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = LedgerConfig::default();
        config.commit.failure_rate = -0.1;
        assert!(matches!(PredictionLedger::new(config), Err(LedgerError::Config(_))));
    }
}

//! Dosechain Core Library
//!
//! Deterministic dosage recommendations with a tamper-evident prediction ledger.
//!
//! # Architecture
//!
//! ```text
//! PatientInput ──validate──▶ DosageRequest
//!                                 │
//!                          DosageEngine (pure)
//!                                 │
//!                        DosageRecommendation
//!                                 │
//!               fingerprint = sha256(subject·drug·dose·ts)
//!                                 │
//!                    ┌────────────▼────────────┐
//!                    │  Simulated ledger commit │── Failure ──▶ CommitFailure
//!                    │  submitted → confirmed   │              (nothing stored)
//!                    └────────────┬────────────┘
//!                                 │ Success
//!                    ┌────────────▼────────────┐
//!                    │    PredictionLedger      │
//!                    │ entries + id/hash index  │
//!                    │ + Merkle audit leaf      │
//!                    └────────────┬────────────┘
//!                                 │
//!             ┌───────────────────┼───────────────────┐
//!             ▼                   ▼                   ▼
//!      Lookup / search      Verification         SQLite journal
//! ```
//!
//! # Core Principle
//!
//! **Nothing is visible until it is committed.** A failed commit leaves the
//! ledger exactly as it was.
//!
//! # Modules
//!
//! - [`engine`]: Dosage computation and the static drug catalog
//! - [`identity`]: Content fingerprints and identifier sources
//! - [`commit`]: Simulated write-once ledger commit
//! - [`ledger`]: Prediction ledger (record, lookup, search, aggregate, verify)
//! - [`merkle`]: Merkle tree for inclusion proofs
//! - [`db`]: SQLite journal for replaying the ledger
//! - [`models`]: Domain types (DosageRequest, DosageRecommendation, LedgerEntry)
//! - [`config`]: Ledger and simulator configuration

pub mod commit;
pub mod config;
pub mod db;
pub mod engine;
pub mod identity;
pub mod ledger;
pub mod merkle;
pub mod models;

// Re-export commonly used types
pub use commit::{CommitFailure, CommitReceipt, CommitSimulator, CommitStatus, StatusSink};
pub use config::{CommitConfig, LedgerConfig};
pub use db::Journal;
pub use engine::DosageEngine;
pub use identity::{fingerprint, IdSource, RandomIds, SeededIds};
pub use ledger::{LedgerError, LedgerStats, PredictionLedger, SearchResults, Verification};
pub use merkle::{verify_proof, MerkleProof, VerificationReport};
pub use models::{
    Alternative, DosageRecommendation, DosageRequest, EntryStatus, Gender, LedgerEntry,
    PatientInput, ValidationError,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum DosechainError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error("Duplicate fingerprint: {0}")]
    DuplicateFingerprint(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Journal error: {0}")]
    JournalError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<ValidationError> for DosechainError {
    fn from(e: ValidationError) -> Self {
        DosechainError::InvalidRequest(e.to_string())
    }
}

impl From<LedgerError> for DosechainError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Commit(failure) => DosechainError::CommitFailed(failure.reason),
            LedgerError::DuplicateFingerprint { .. } => {
                DosechainError::DuplicateFingerprint(e.to_string())
            }
            LedgerError::Config(inner) => DosechainError::ConfigError(inner.to_string()),
            LedgerError::Persist(inner) => DosechainError::JournalError(inner.to_string()),
            other => DosechainError::InternalError(other.to_string()),
        }
    }
}

impl From<db::JournalError> for DosechainError {
    fn from(e: db::JournalError) -> Self {
        DosechainError::JournalError(e.to_string())
    }
}

impl From<config::ConfigError> for DosechainError {
    fn from(e: config::ConfigError) -> Self {
        DosechainError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for DosechainError {
    fn from(e: serde_json::Error) -> Self {
        DosechainError::InternalError(e.to_string())
    }
}

impl From<std::io::Error> for DosechainError {
    fn from(e: std::io::Error) -> Self {
        DosechainError::InternalError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for DosechainError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        DosechainError::JournalError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open (or create) a journaled ledger at the given path and replay it.
#[uniffi::export]
pub fn open_ledger(
    path: String,
    config_toml: Option<String>,
) -> Result<Arc<DosechainCore>, DosechainError> {
    let config = match config_toml {
        Some(source) => LedgerConfig::from_toml_str(&source)?,
        None => LedgerConfig::default(),
    };
    let journal = Journal::open(&path)?;
    DosechainCore::from_journal(journal, config)
}

/// Create an in-memory ledger (for testing).
#[uniffi::export]
pub fn open_ledger_in_memory() -> Result<Arc<DosechainCore>, DosechainError> {
    let journal = Journal::open_in_memory()?;
    DosechainCore::from_journal(journal, LedgerConfig::default())
}

/// Fingerprint of (subject, drug, dosage, timestamp).
#[uniffi::export]
pub fn compute_fingerprint(
    subject_id: String,
    drug_name: String,
    dosage_mg: u32,
    timestamp_ms: i64,
) -> String {
    fingerprint(&subject_id, &drug_name, dosage_mg, timestamp_ms)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe ledger handle for FFI.
#[derive(uniffi::Object)]
pub struct DosechainCore {
    ledger: Arc<PredictionLedger>,
    journal: Mutex<Journal>,
    engine: DosageEngine,
    runtime: tokio::runtime::Runtime,
}

impl DosechainCore {
    /// Replay the journal into a fresh ledger.
    pub fn from_journal(
        journal: Journal,
        config: LedgerConfig,
    ) -> Result<Arc<Self>, DosechainError> {
        let entries = journal.load_entries()?;
        let ledger = PredictionLedger::restore(config, entries)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        Ok(Arc::new(Self {
            ledger: Arc::new(ledger),
            journal: Mutex::new(journal),
            engine: DosageEngine::new(),
            runtime,
        }))
    }

    /// The underlying ledger, for Rust callers.
    pub fn ledger(&self) -> Arc<PredictionLedger> {
        Arc::clone(&self.ledger)
    }
}

#[uniffi::export]
impl DosechainCore {
    // =========================================================================
    // Engine Operations
    // =========================================================================

    /// Validate input and compute a recommendation without recording it.
    pub fn recommend(&self, input: FfiPatientInput) -> Result<FfiRecommendation, DosechainError> {
        let request = PatientInput::from(input).validate()?;
        Ok(self.engine.compute_recommendation(&request).into())
    }

    /// Closest catalog drug for a misspelled name.
    pub fn suggest_drug(&self, drug_name: String) -> Option<String> {
        engine::catalog::suggest(&drug_name).map(str::to_string)
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Validate, compute, commit and journal a prediction.
    ///
    /// Blocks until the simulated commit reaches a terminal state. The entry
    /// is visible in the ledger only once it has been journaled.
    pub fn record_prediction(
        &self,
        input: FfiPatientInput,
    ) -> Result<FfiRecordedPrediction, DosechainError> {
        let request = PatientInput::from(input).validate()?;
        let recommendation = self.engine.compute_recommendation(&request);

        let journal = self.journal.lock()?;
        let (sink, mut progress) = self.ledger.status_channel();
        let entry = self.runtime.block_on(self.ledger.record_with(
            request,
            recommendation,
            Some(&sink),
            |entry| journal.append_entry(entry),
        ))?;
        drop(journal);

        let mut statuses = Vec::new();
        while let Ok(status) = progress.try_recv() {
            statuses.push(status.to_string());
        }

        Ok(FfiRecordedPrediction {
            entry: entry.as_ref().into(),
            progress: statuses,
        })
    }

    /// Get a prediction by entry ID.
    pub fn get_prediction(&self, entry_id: String) -> Option<FfiLedgerEntry> {
        self.ledger.get_by_id(&entry_id).map(|e| e.as_ref().into())
    }

    /// Get a prediction by fingerprint.
    pub fn get_prediction_by_hash(&self, fingerprint: String) -> Option<FfiLedgerEntry> {
        self.ledger.get_by_hash(&fingerprint).map(|e| e.as_ref().into())
    }

    /// Search by subject ID, drug name, or entry ID.
    pub fn search_predictions(&self, query: String) -> Vec<FfiLedgerEntry> {
        self.ledger
            .search(&query)
            .iter()
            .map(|e| e.as_ref().into())
            .collect()
    }

    /// Dashboard statistics.
    pub fn ledger_stats(&self) -> FfiLedgerStats {
        self.ledger.aggregate().into()
    }

    // =========================================================================
    // Verification Operations
    // =========================================================================

    /// Re-verify a fingerprint against the ledger.
    pub fn verify_prediction(
        &self,
        fingerprint: String,
    ) -> Result<Option<FfiVerification>, DosechainError> {
        Ok(self.ledger.verify(&fingerprint)?.map(Into::into))
    }

    /// Export a JSON verification report for a fingerprint.
    pub fn export_verification_report(&self, fingerprint: String) -> Result<String, DosechainError> {
        let verification = self
            .ledger
            .verify(&fingerprint)?
            .ok_or(DosechainError::NotFound(fingerprint))?;
        Ok(verification.to_report().to_json()?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientInput {
    pub subject_id: Option<String>,
    pub age: f64,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub gender: String,
    pub drug_name: String,
    pub genetic_markers: Vec<String>,
    pub medical_history: Vec<String>,
    pub current_medications: Vec<String>,
}

impl From<FfiPatientInput> for PatientInput {
    fn from(input: FfiPatientInput) -> Self {
        PatientInput {
            subject_id: input.subject_id,
            age: input.age,
            weight_kg: input.weight_kg,
            height_cm: input.height_cm,
            gender: input.gender,
            drug_name: input.drug_name,
            genetic_markers: input.genetic_markers,
            medical_history: input.medical_history,
            current_medications: input.current_medications,
        }
    }
}

/// FFI-safe alternative drug.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAlternative {
    pub drug_name: String,
    pub dosage_mg: u32,
}

impl From<&Alternative> for FfiAlternative {
    fn from(alt: &Alternative) -> Self {
        Self {
            drug_name: alt.drug_name.clone(),
            dosage_mg: alt.dosage_mg,
        }
    }
}

/// FFI-safe recommendation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecommendation {
    pub dosage_mg: u32,
    pub confidence: f64,
    pub alternatives: Vec<FfiAlternative>,
    pub created_at_ms: i64,
}

impl From<DosageRecommendation> for FfiRecommendation {
    fn from(rec: DosageRecommendation) -> Self {
        Self {
            dosage_mg: rec.dosage_mg,
            confidence: rec.confidence,
            alternatives: rec.alternatives.iter().map(Into::into).collect(),
            created_at_ms: rec.created_at_ms,
        }
    }
}

/// FFI-safe ledger entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLedgerEntry {
    pub entry_id: String,
    pub subject_id: String,
    pub drug_name: String,
    pub dosage_display: String,
    pub dosage_mg: u32,
    pub confidence: f64,
    pub alternatives: Vec<FfiAlternative>,
    pub fingerprint: String,
    pub transaction_ref: String,
    pub status: String,
    pub created_at_ms: i64,
    pub committed_at: String,
}

impl From<&LedgerEntry> for FfiLedgerEntry {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            entry_id: entry.entry_id.clone(),
            subject_id: entry.subject_id.clone(),
            drug_name: entry.drug_name.clone(),
            dosage_display: entry.dosage_display.clone(),
            dosage_mg: entry.recommendation.dosage_mg,
            confidence: entry.recommendation.confidence,
            alternatives: entry.recommendation.alternatives.iter().map(Into::into).collect(),
            fingerprint: entry.fingerprint.clone(),
            transaction_ref: entry.transaction_ref.clone(),
            status: entry.status.as_str().to_string(),
            created_at_ms: entry.recommendation.created_at_ms,
            committed_at: entry.committed_at.clone(),
        }
    }
}

/// FFI-safe record outcome with the commit progress it went through.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecordedPrediction {
    pub entry: FfiLedgerEntry,
    pub progress: Vec<String>,
}

/// FFI-safe ledger statistics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLedgerStats {
    pub count: u64,
    pub average_confidence: f64,
    pub unique_subject_count: u64,
    pub most_frequent_drug: Option<String>,
}

impl From<LedgerStats> for FfiLedgerStats {
    fn from(stats: LedgerStats) -> Self {
        Self {
            count: stats.count as u64,
            average_confidence: stats.average_confidence,
            unique_subject_count: stats.unique_subject_count as u64,
            most_frequent_drug: stats.most_frequent_drug,
        }
    }
}

/// FFI-safe verification result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVerification {
    pub entry: FfiLedgerEntry,
    pub fingerprint_matches: bool,
    pub proof_valid: bool,
    pub root_hash: String,
    pub leaf_index: u64,
}

impl From<Verification> for FfiVerification {
    fn from(v: Verification) -> Self {
        Self {
            entry: v.entry.as_ref().into(),
            fingerprint_matches: v.fingerprint_matches,
            proof_valid: v.proof_valid,
            root_hash: v.proof.root_hash.clone(),
            leaf_index: v.proof.leaf_index as u64,
        }
    }
}

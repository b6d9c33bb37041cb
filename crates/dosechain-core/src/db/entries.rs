//! Ledger entry journal operations.

use rusqlite::{ffi, params, OptionalExtension};

use super::{Journal, JournalError, JournalResult};
use crate::models::LedgerEntry;

impl Journal {
    /// Append a committed entry.
    ///
    /// Only a UNIQUE violation on entry id or fingerprint maps to
    /// [`JournalError::Constraint`]; any other failure is passed through.
    pub fn append_entry(&self, entry: &LedgerEntry) -> JournalResult<()> {
        let payload = entry.to_canonical_json()?;

        self.conn
            .execute(
                r#"
                INSERT INTO ledger_entries (
                    entry_id, fingerprint, subject_id, drug_name,
                    transaction_ref, payload
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    entry.entry_id,
                    entry.fingerprint,
                    entry.subject_id,
                    entry.drug_name,
                    entry.transaction_ref,
                    payload,
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    JournalError::Constraint(format!(
                        "entry {} or fingerprint {} already journaled",
                        entry.entry_id, entry.fingerprint
                    ))
                }
                other => other.into(),
            })?;
        Ok(())
    }

    /// Load every entry in journal order.
    pub fn load_entries(&self) -> JournalResult<Vec<LedgerEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM ledger_entries ORDER BY seq ASC")?;

        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(JournalError::from))
            .collect()
    }

    /// Look up a journaled entry by fingerprint.
    pub fn get_entry_by_fingerprint(&self, fingerprint: &str) -> JournalResult<Option<LedgerEntry>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM ledger_entries WHERE fingerprint = ?",
                [fingerprint],
                |row| row.get(0),
            )
            .optional()?;

        payload
            .map(|p| serde_json::from_str(&p))
            .transpose()
            .map_err(Into::into)
    }

    /// Number of journaled entries.
    pub fn entry_count(&self) -> JournalResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DosageEngine;
    use crate::identity::fingerprint;
    use crate::models::{DosageRequest, EntryStatus, Gender};

    fn make_entry(id: &str, subject: &str) -> LedgerEntry {
        let request = DosageRequest::new(30.0, 70.0, 170.0, Gender::Female, "ibuprofen")
            .with_subject_id(subject)
            .with_timestamp(1_700_000_000_000);
        let recommendation = DosageEngine::new().compute_recommendation(&request);

        LedgerEntry {
            entry_id: id.to_string(),
            subject_id: subject.to_string(),
            drug_name: "ibuprofen".to_string(),
            dosage_display: recommendation.dosage_display(),
            fingerprint: fingerprint(subject, "ibuprofen", recommendation.dosage_mg, recommendation.created_at_ms),
            transaction_ref: format!("0x{}", id),
            status: EntryStatus::Committed,
            recommendation,
            request,
            committed_at: "2024-01-15T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_append_and_load_in_order() {
        let journal = Journal::open_in_memory().unwrap();
        journal.append_entry(&make_entry("pred_2", "patient-b")).unwrap();
        journal.append_entry(&make_entry("pred_1", "patient-a")).unwrap();

        let entries = journal.load_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_id, "pred_2");
        assert_eq!(entries[1].entry_id, "pred_1");
        assert_eq!(entries[0].fingerprint, make_entry("pred_2", "patient-b").fingerprint);
        assert_eq!(entries[0].recommendation.dosage_mg, 400);
    }

    #[test]
    fn test_duplicate_rejected() {
        let journal = Journal::open_in_memory().unwrap();
        let entry = make_entry("pred_1", "patient-a");
        journal.append_entry(&entry).unwrap();

        let result = journal.append_entry(&entry);
        assert!(matches!(result, Err(JournalError::Constraint(_))));
        assert_eq!(journal.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_trigger_abort_is_not_a_duplicate() {
        let journal = Journal::open_in_memory().unwrap();
        journal
            .conn()
            .execute_batch(
                "CREATE TRIGGER journal_offline BEFORE INSERT ON ledger_entries BEGIN
                     SELECT RAISE(ABORT, 'journal offline');
                 END;",
            )
            .unwrap();

        let result = journal.append_entry(&make_entry("pred_1", "patient-a"));
        match result {
            Err(JournalError::Sqlite(e)) => assert!(e.to_string().contains("journal offline")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(journal.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_reused_fingerprint_is_constraint() {
        let journal = Journal::open_in_memory().unwrap();
        let entry = make_entry("pred_1", "patient-a");
        journal.append_entry(&entry).unwrap();

        let reused = LedgerEntry {
            entry_id: "pred_2".to_string(),
            ..entry
        };
        assert!(matches!(journal.append_entry(&reused), Err(JournalError::Constraint(_))));
        assert_eq!(journal.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_entries_immutable() {
        let journal = Journal::open_in_memory().unwrap();
        journal.append_entry(&make_entry("pred_1", "patient-a")).unwrap();

        let result = journal
            .conn()
            .execute("DELETE FROM ledger_entries WHERE entry_id = 'pred_1'", []);
        assert!(result.is_err());
        assert_eq!(journal.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_get_by_fingerprint() {
        let journal = Journal::open_in_memory().unwrap();
        let entry = make_entry("pred_1", "patient-a");
        journal.append_entry(&entry).unwrap();

        let found = journal.get_entry_by_fingerprint(&entry.fingerprint).unwrap();
        assert_eq!(found.map(|e| e.entry_id), Some("pred_1".to_string()));
        assert!(journal.get_entry_by_fingerprint("missing").unwrap().is_none());
    }
}

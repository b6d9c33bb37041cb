//! SQLite schema definition.

/// Journal schema for committed predictions.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Ledger Journal (append-only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS ledger_entries (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,      -- replay order
    entry_id TEXT NOT NULL UNIQUE,
    fingerprint TEXT NOT NULL UNIQUE,
    subject_id TEXT NOT NULL,
    drug_name TEXT NOT NULL,
    transaction_ref TEXT NOT NULL,
    payload TEXT NOT NULL,                      -- canonical JSON of the entry
    journaled_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_ledger_subject ON ledger_entries(subject_id);

-- Entries are immutable once journaled
CREATE TRIGGER IF NOT EXISTS ledger_entries_no_update BEFORE UPDATE ON ledger_entries BEGIN
    SELECT RAISE(ABORT, 'ledger entries are immutable');
END;

CREATE TRIGGER IF NOT EXISTS ledger_entries_no_delete BEFORE DELETE ON ledger_entries BEGIN
    SELECT RAISE(ABORT, 'ledger entries are immutable');
END;
"#;

//! SQLite journal for committed predictions.
//!
//! The journal is an ordered list of entries; replaying it through
//! [`crate::PredictionLedger::restore`] rebuilds every index.

mod entries;
mod schema;

pub use schema::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

/// Journal errors.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type JournalResult<T> = Result<T, JournalError>;

/// Journal connection wrapper.
pub struct Journal {
    conn: Connection,
}

impl Journal {
    /// Open journal at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> JournalResult<Self> {
        let conn = Connection::open(path)?;
        let journal = Self { conn };
        journal.initialize()?;
        Ok(journal)
    }

    /// Create in-memory journal (for testing).
    pub fn open_in_memory() -> JournalResult<Self> {
        let conn = Connection::open_in_memory()?;
        let journal = Self { conn };
        journal.initialize()?;
        Ok(journal)
    }

    fn initialize(&self) -> JournalResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

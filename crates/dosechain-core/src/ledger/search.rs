//! Case-insensitive ledger search over a snapshot.

use std::sync::Arc;

use crate::models::LedgerEntry;

/// Matches of a search query against a ledger snapshot.
///
/// Matching is lazy: iterating filters the snapshot on the fly, and every
/// call to [`SearchResults::iter`] starts over from the first entry.
#[derive(Debug, Clone)]
pub struct SearchResults {
    snapshot: Vec<Arc<LedgerEntry>>,
    needle: String,
}

impl SearchResults {
    pub(crate) fn new(snapshot: Vec<Arc<LedgerEntry>>, query: &str) -> Self {
        Self {
            snapshot,
            needle: query.trim().to_lowercase(),
        }
    }

    /// Normalized (trimmed, lowercased) query.
    pub fn query(&self) -> &str {
        &self.needle
    }

    /// Matching entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<LedgerEntry>> + '_ {
        self.snapshot
            .iter()
            .filter(move |entry| matches_query(entry, &self.needle))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn to_vec(&self) -> Vec<Arc<LedgerEntry>> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a SearchResults {
    type Item = &'a Arc<LedgerEntry>;
    type IntoIter = Box<dyn Iterator<Item = &'a Arc<LedgerEntry>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Substring match on subject id, drug name or entry id. Empty matches all.
pub fn matches_query(entry: &LedgerEntry, needle_lower: &str) -> bool {
    if needle_lower.is_empty() {
        return true;
    }
    [&entry.subject_id, &entry.drug_name, &entry.entry_id]
        .iter()
        .any(|field| field.to_lowercase().contains(needle_lower))
}

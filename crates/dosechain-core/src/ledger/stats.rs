//! Derived ledger statistics.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::LedgerEntry;

/// Read-only statistics over the current entry set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerStats {
    pub count: usize,
    /// Mean confidence; 0.0 for an empty ledger
    pub average_confidence: f64,
    pub unique_subject_count: usize,
    /// Most recorded drug; ties go to the drug seen first
    pub most_frequent_drug: Option<String>,
}

pub(crate) fn aggregate(entries: &[Arc<LedgerEntry>]) -> LedgerStats {
    let count = entries.len();
    let average_confidence = if count == 0 {
        0.0
    } else {
        entries.iter().map(|e| e.confidence()).sum::<f64>() / count as f64
    };

    let unique_subject_count = entries
        .iter()
        .map(|e| e.subject_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    LedgerStats {
        count,
        average_confidence,
        unique_subject_count,
        most_frequent_drug: most_frequent_drug(entries),
    }
}

/// Counts are kept in first-seen order so a strict `>` scan picks the
/// earliest drug among those tied for the maximum.
fn most_frequent_drug(entries: &[Arc<LedgerEntry>]) -> Option<String> {
    let mut order: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for entry in entries {
        let drug = entry.drug_name.as_str();
        match index.get(drug) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(drug, order.len());
                order.push((drug, 1));
            }
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (drug, count) in order {
        if best.map_or(true, |(_, max)| count > max) {
            best = Some((drug, count));
        }
    }
    best.map(|(drug, _)| drug.to_string())
}

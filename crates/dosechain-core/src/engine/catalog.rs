//! Static drug catalog: base doses and substitution table.

use strsim::jaro_winkler;

use crate::models::Alternative;

/// Base dose for drugs without a catalog dose (mg).
pub const DEFAULT_BASE_DOSE_MG: f64 = 100.0;

/// Minimum similarity for a "did you mean" suggestion.
const MIN_SUGGESTION_SIMILARITY: f64 = 0.80;

/// A catalog drug.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogDrug {
    pub name: &'static str,
    /// Base dose in mg; `None` falls back to [`DEFAULT_BASE_DOSE_MG`]
    pub base_dose_mg: Option<f64>,
    /// Substitutes as (drug, mg)
    pub alternatives: &'static [(&'static str, u32)],
}

impl CatalogDrug {
    pub fn base_dose(&self) -> f64 {
        self.base_dose_mg.unwrap_or(DEFAULT_BASE_DOSE_MG)
    }

    pub fn alternatives(&self) -> Vec<Alternative> {
        self.alternatives
            .iter()
            .map(|(name, dosage_mg)| Alternative {
                drug_name: (*name).to_string(),
                dosage_mg: *dosage_mg,
            })
            .collect()
    }
}

/// Drugs offered by the intake form.
pub const CATALOG: &[CatalogDrug] = &[
    CatalogDrug {
        name: "ibuprofen",
        base_dose_mg: Some(400.0),
        alternatives: &[("naproxen", 250), ("acetaminophen", 500)],
    },
    CatalogDrug {
        name: "acetaminophen",
        base_dose_mg: Some(500.0),
        alternatives: &[("ibuprofen", 400), ("aspirin", 325)],
    },
    CatalogDrug {
        name: "amoxicillin",
        base_dose_mg: Some(250.0),
        alternatives: &[("azithromycin", 250), ("doxycycline", 100)],
    },
    CatalogDrug {
        name: "lisinopril",
        base_dose_mg: None,
        alternatives: &[],
    },
    CatalogDrug {
        name: "metformin",
        base_dose_mg: None,
        alternatives: &[],
    },
    CatalogDrug {
        name: "atorvastatin",
        base_dose_mg: None,
        alternatives: &[],
    },
    CatalogDrug {
        name: "levothyroxine",
        base_dose_mg: None,
        alternatives: &[],
    },
];

/// Look up a drug by name (trimmed, case-insensitive).
pub fn lookup(drug_name: &str) -> Option<&'static CatalogDrug> {
    let wanted = drug_name.trim();
    CATALOG.iter().find(|d| d.name.eq_ignore_ascii_case(wanted))
}

/// Base dose for a drug, falling back to the default.
pub fn base_dose(drug_name: &str) -> f64 {
    lookup(drug_name)
        .map(CatalogDrug::base_dose)
        .unwrap_or(DEFAULT_BASE_DOSE_MG)
}

/// Substitution list for a drug; empty for unknown drugs.
pub fn alternatives_for(drug_name: &str) -> Vec<Alternative> {
    lookup(drug_name)
        .map(CatalogDrug::alternatives)
        .unwrap_or_default()
}

/// Closest catalog name for a misspelled drug, if any is close enough.
///
/// Exact matches return `None`; there is nothing to suggest.
pub fn suggest(drug_name: &str) -> Option<&'static str> {
    let lower = drug_name.trim().to_lowercase();
    if lower.is_empty() || lookup(&lower).is_some() {
        return None;
    }

    CATALOG
        .iter()
        .map(|d| (d.name, jaro_winkler(&lower, d.name)))
        .filter(|(_, score)| *score >= MIN_SUGGESTION_SIMILARITY)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(name, _)| name)
}

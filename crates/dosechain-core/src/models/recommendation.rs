//! Dosage recommendation models.

use serde::{Deserialize, Serialize};

/// An alternative drug suggestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alternative {
    pub drug_name: String,
    pub dosage_mg: u32,
}

/// Factors applied to the base dose, kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoseBreakdown {
    /// Catalog base dose in mg
    pub base_dose_mg: f64,
    /// weight / 70 kg
    pub weight_factor: f64,
    pub age_factor: f64,
    pub genetic_factor: f64,
    pub medical_factor: f64,
    /// Product of base and all factors, before rounding
    pub unrounded_mg: f64,
}

/// Engine output. Never mutated once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosageRecommendation {
    /// Recommended dose in mg (a positive multiple of 5)
    pub dosage_mg: u32,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
    /// Up to two substitute drugs
    pub alternatives: Vec<Alternative>,
    /// Creation time in ms since epoch
    pub created_at_ms: i64,
    pub breakdown: DoseBreakdown,
}

impl DosageRecommendation {
    /// Display form used on ledger entries ("400 mg").
    pub fn dosage_display(&self) -> String {
        format!("{} mg", self.dosage_mg)
    }
}

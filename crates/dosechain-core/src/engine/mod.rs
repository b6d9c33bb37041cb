//! Dosage computation engine.
//!
//! Multiplicative step-function model:
//!
//! ```text
//! dose = base(drug) × weight/70 × age × genetic × medical
//! ```
//!
//! rounded half-up to the nearest 5 mg. Every factor is kept in the
//! recommendation's [`DoseBreakdown`] so a committed record can be audited.

pub mod catalog;

use crate::models::{DoseBreakdown, DosageRecommendation, DosageRequest};

/// Confidence reported by this engine version.
pub const ENGINE_CONFIDENCE: f64 = 0.89;

/// Reference adult weight for weight scaling (kg).
pub const REFERENCE_WEIGHT_KG: f64 = 70.0;

/// Dosages are rounded to this step (mg).
pub const DOSE_STEP_MG: f64 = 5.0;

pub const POOR_METABOLIZER: &str = "CYP2D6 - Poor Metabolizer";
pub const RAPID_METABOLIZER: &str = "CYP2D6 - Rapid Metabolizer";
pub const LIVER_DISEASE: &str = "Liver Disease";
pub const KIDNEY_DISEASE: &str = "Chronic Kidney Disease";

/// Deterministic dosage engine. Holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct DosageEngine;

impl DosageEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compute a recommendation. Never fails.
    ///
    /// The timestamp is taken from the request when present, otherwise the
    /// current wall clock.
    pub fn compute_recommendation(&self, request: &DosageRequest) -> DosageRecommendation {
        let created_at_ms = request
            .requested_at_ms
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        let breakdown = self.breakdown(request);
        let dosage_mg = round_to_step(breakdown.unrounded_mg);

        DosageRecommendation {
            dosage_mg,
            confidence: ENGINE_CONFIDENCE,
            alternatives: catalog::alternatives_for(&request.drug_name),
            created_at_ms,
            breakdown,
        }
    }

    /// Compute each factor and the unrounded dose.
    pub fn breakdown(&self, request: &DosageRequest) -> DoseBreakdown {
        let base_dose_mg = catalog::base_dose(&request.drug_name);
        let weight_factor = weight_factor(request.weight_kg);
        let age_factor = age_factor(request.age);
        let genetic_factor = genetic_factor(request);
        let medical_factor = medical_factor(request);

        DoseBreakdown {
            base_dose_mg,
            weight_factor,
            age_factor,
            genetic_factor,
            medical_factor,
            unrounded_mg: base_dose_mg * weight_factor * age_factor * genetic_factor * medical_factor,
        }
    }
}

/// Linear scaling against the reference adult. Unusable weights scale by 1.
pub fn weight_factor(weight_kg: f64) -> f64 {
    if weight_kg.is_finite() && weight_kg > 0.0 {
        weight_kg / REFERENCE_WEIGHT_KG
    } else {
        1.0
    }
}

/// Step function: elderly (> 65) 0.8, minors (< 18) 0.7.
pub fn age_factor(age: f64) -> f64 {
    if !age.is_finite() {
        1.0
    } else if age > 65.0 {
        0.8
    } else if age < 18.0 {
        0.7
    } else {
        1.0
    }
}

/// Poor metabolizer wins over rapid metabolizer.
pub fn genetic_factor(request: &DosageRequest) -> f64 {
    if request.has_marker(POOR_METABOLIZER) {
        0.7
    } else if request.has_marker(RAPID_METABOLIZER) {
        1.3
    } else {
        1.0
    }
}

/// Liver disease wins over kidney disease.
pub fn medical_factor(request: &DosageRequest) -> f64 {
    if request.has_history(LIVER_DISEASE) {
        0.7
    } else if request.has_history(KIDNEY_DISEASE) {
        0.8
    } else {
        1.0
    }
}

/// Round half-up to the nearest step, never below one step.
pub fn round_to_step(dose_mg: f64) -> u32 {
    if !dose_mg.is_finite() || dose_mg <= 0.0 {
        return DOSE_STEP_MG as u32;
    }
    let rounded = (dose_mg / DOSE_STEP_MG + 0.5).floor() * DOSE_STEP_MG;
    (rounded as u32).max(DOSE_STEP_MG as u32)
}

//! Dosage request models and boundary validation.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tag values a form uses to mean "nothing selected".
const NONE_TAG: &str = "none";

/// Raw input rejected before it reaches the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Age must be a positive number, got {0}")]
    InvalidAge(f64),

    #[error("Weight must be a positive number of kg, got {0}")]
    InvalidWeight(f64),

    #[error("Height must be a positive number of cm, got {0}")]
    InvalidHeight(f64),

    #[error("Unknown gender: {0}")]
    UnknownGender(String),

    #[error("Drug name is required")]
    MissingDrugName,
}

/// Patient gender as collected by the intake form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(ValidationError::UnknownGender(s.to_string())),
        }
    }
}

/// A validated request for a dosage recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosageRequest {
    /// Subject identifier; assigned by the ledger when absent
    pub subject_id: Option<String>,
    /// Age in years
    pub age: f64,
    /// Body weight in kg
    pub weight_kg: f64,
    /// Height in cm
    pub height_cm: f64,
    pub gender: Gender,
    /// Drug name as selected (matched case-insensitively against the catalog)
    pub drug_name: String,
    /// Pharmacogenomic markers (e.g. "CYP2D6 - Poor Metabolizer")
    pub genetic_markers: BTreeSet<String>,
    /// Medical history tags (e.g. "Liver Disease")
    pub medical_history: BTreeSet<String>,
    /// Current medications
    pub current_medications: BTreeSet<String>,
    /// Request time in ms since epoch; the engine stamps "now" when absent
    pub requested_at_ms: Option<i64>,
}

impl DosageRequest {
    /// Create a request with no tags, no subject id and no timestamp.
    pub fn new(age: f64, weight_kg: f64, height_cm: f64, gender: Gender, drug_name: impl Into<String>) -> Self {
        Self {
            subject_id: None,
            age,
            weight_kg,
            height_cm,
            gender,
            drug_name: drug_name.into(),
            genetic_markers: BTreeSet::new(),
            medical_history: BTreeSet::new(),
            current_medications: BTreeSet::new(),
            requested_at_ms: None,
        }
    }

    pub fn with_subject_id(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.genetic_markers.insert(marker.into());
        self
    }

    pub fn with_history(mut self, condition: impl Into<String>) -> Self {
        self.medical_history.insert(condition.into());
        self
    }

    pub fn with_medication(mut self, medication: impl Into<String>) -> Self {
        self.current_medications.insert(medication.into());
        self
    }

    pub fn with_timestamp(mut self, requested_at_ms: i64) -> Self {
        self.requested_at_ms = Some(requested_at_ms);
        self
    }

    /// Case-insensitive genetic marker check.
    pub fn has_marker(&self, marker: &str) -> bool {
        contains_tag(&self.genetic_markers, marker)
    }

    /// Case-insensitive medical history check.
    pub fn has_history(&self, condition: &str) -> bool {
        contains_tag(&self.medical_history, condition)
    }
}

fn contains_tag(tags: &BTreeSet<String>, wanted: &str) -> bool {
    tags.iter().any(|t| t.trim().eq_ignore_ascii_case(wanted))
}

/// Unvalidated patient input as collected by an intake form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientInput {
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

impl PatientInput {
    /// Validate raw input into a [`DosageRequest`].
    pub fn validate(&self) -> Result<DosageRequest, ValidationError> {
        if !self.age.is_finite() || self.age <= 0.0 {
            return Err(ValidationError::InvalidAge(self.age));
        }
        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            return Err(ValidationError::InvalidWeight(self.weight_kg));
        }
        if !self.height_cm.is_finite() || self.height_cm <= 0.0 {
            return Err(ValidationError::InvalidHeight(self.height_cm));
        }
        let gender: Gender = self.gender.parse()?;

        let drug_name = self.drug_name.trim();
        if drug_name.is_empty() {
            return Err(ValidationError::MissingDrugName);
        }

        let subject_id = self
            .subject_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(DosageRequest {
            subject_id,
            age: self.age,
            weight_kg: self.weight_kg,
            height_cm: self.height_cm,
            gender,
            drug_name: drug_name.to_string(),
            genetic_markers: clean_tags(&self.genetic_markers),
            medical_history: clean_tags(&self.medical_history),
            current_medications: clean_tags(&self.current_medications),
            requested_at_ms: None,
        })
    }
}

/// Trim tags and drop empties and the "None" placeholder.
fn clean_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case(NONE_TAG))
        .map(str::to_string)
        .collect()
}

//! Row types for the read-only trial store.

use serde::{Deserialize, Serialize};

/// Recruitment statuses that make a trial searchable.
pub const ACTIVE_STATUSES: [&str; 3] =
    ["ENROLLING_BY_INVITATION", "NOT_YET_RECRUITING", "RECRUITING"];

/// True when `status` marks a trial (or site) as open to participants.
pub fn is_active_status(status: &str) -> bool {
    ACTIVE_STATUSES.contains(&status.trim().to_ascii_uppercase().as_str())
}

/// One `(trial, declared condition)` pair, the unit the index is built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TrialCondition {
    pub nct_id: String,
    /// Condition name, lower-cased at ingest.
    pub condition: String,
}

/// Trial-level facts joined onto every ranked site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSummary {
    pub nct_id: String,
    pub overall_status: String,
    pub phase: Option<String>,
    pub study_type: Option<String>,
}

/// A physical site where a trial enrols participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    pub nct_id: String,
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: Option<String>,
}

impl Facility {
    /// Address key used to deduplicate sites within one trial.
    pub fn address_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.city.as_deref().unwrap_or(""),
            self.state.as_deref().unwrap_or(""),
            self.zip.as_deref().unwrap_or("")
        )
    }
}

/// Eligibility facts as stored; age bounds stay free text until parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityRecord {
    pub nct_id: String,
    pub gender: Option<String>,
    pub minimum_age: Option<String>,
    pub maximum_age: Option<String>,
}

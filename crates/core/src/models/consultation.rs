//! Clinical encounters between a patient and a doctor.

use carebook_types::{Amount, NonEmptyText};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    InProgress,
    Completed,
}

impl ConsultationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConsultationStatus {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(crate::CoreError::Validation(format!(
                "unknown consultation status '{other}'"
            ))),
        }
    }
}

/// A consultation record.
///
/// `completed_at` is `Some` exactly when `status` is `Completed`, and is never earlier
/// than `started_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub appointment_id: Option<i64>,
    pub consultation_type: NonEmptyText,
    pub notes: Option<String>,
    pub fee: Option<Amount>,
    pub status: ConsultationStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consultation {
    pub fn is_completed(&self) -> bool {
        self.status == ConsultationStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewConsultation {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub appointment_id: Option<i64>,
    pub consultation_type: String,
    pub notes: Option<String>,
    pub fee: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompleteConsultation {
    pub notes: Option<String>,
    pub expected_version: Option<u64>,
    /// Also mark the consultation's pending payment as paid.
    pub settle_payment: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsultationFilter {
    pub patient_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub status: Option<ConsultationStatus>,
}

impl ConsultationFilter {
    pub fn matches(&self, consultation: &Consultation) -> bool {
        self.patient_id.map_or(true, |p| consultation.patient_id == p)
            && self.doctor_id.map_or(true, |d| consultation.doctor_id == d)
            && self.status.map_or(true, |s| consultation.status == s)
    }
}

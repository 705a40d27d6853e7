//! Home-care visits: a provider attending a patient at an address.

use carebook_types::NonEmptyText;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl VisitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Scheduled, Self::InProgress)
                | (Self::Scheduled, Self::Cancelled)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Cancelled)
        )
    }
}

impl std::fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VisitStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::Validation(format!(
                "unknown visit status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeCareVisit {
    pub id: i64,
    pub patient_id: i64,
    pub provider_id: i64,
    pub appointment_id: Option<i64>,
    pub visit_date: NaiveDate,
    pub address: NonEmptyText,
    pub latitude: f64,
    pub longitude: f64,
    pub duration_hours: f64,
    pub special_requirements: Option<String>,
    pub status: VisitStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHomeCareVisit {
    pub patient_id: i64,
    pub provider_id: i64,
    pub appointment_id: Option<i64>,
    pub visit_date: NaiveDate,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub duration_hours: f64,
    pub special_requirements: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HomeCareVisitUpdate {
    pub visit_date: NaiveDate,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub duration_hours: f64,
    pub special_requirements: Option<String>,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompleteVisit {
    pub expected_version: Option<u64>,
    pub settle_payment: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitFilter {
    pub patient_id: Option<i64>,
    pub provider_id: Option<i64>,
    pub status: Option<VisitStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl VisitFilter {
    pub fn matches(&self, visit: &HomeCareVisit) -> bool {
        self.patient_id.map_or(true, |p| visit.patient_id == p)
            && self.provider_id.map_or(true, |p| visit.provider_id == p)
            && self.status.map_or(true, |s| visit.status == s)
            && self.date_from.map_or(true, |d| visit.visit_date >= d)
            && self.date_to.map_or(true, |d| visit.visit_date <= d)
    }
}

/// Checks coordinates and duration of a visit request.
pub(crate) fn validate_location(
    latitude: f64,
    longitude: f64,
    duration_hours: f64,
) -> CoreResult<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(CoreError::Validation(format!(
            "latitude must be between -90 and 90, got {latitude}"
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(CoreError::Validation(format!(
            "longitude must be between -180 and 180, got {longitude}"
        )));
    }
    if !duration_hours.is_finite() || duration_hours <= 0.0 {
        return Err(CoreError::Validation(
            "duration_hours must be greater than zero".into(),
        ));
    }
    Ok(())
}

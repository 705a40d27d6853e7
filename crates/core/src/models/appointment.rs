//! Booking records.
//!
//! An appointment reserves a time slot on one date between a patient and exactly one
//! provider. The provider is held as a [`ProviderRef`], so the "exactly one of doctor or
//! home-care provider, matching the provider type" rule holds for every stored record.

use crate::models::require_id;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Doctor,
    HomeCareProvider,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::HomeCareProvider => "home_care_provider",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doctor" => Ok(Self::Doctor),
            "home_care_provider" => Ok(Self::HomeCareProvider),
            other => Err(CoreError::Validation(format!(
                "unknown provider type '{other}'"
            ))),
        }
    }
}

/// The single provider a booking, review or visit is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ProviderRef {
    Doctor(i64),
    HomeCareProvider(i64),
}

impl ProviderRef {
    /// Builds a reference from the loose request shape.
    ///
    /// Exactly one of the two ids must be present, and it must be the one named by
    /// `provider_type`.
    pub fn from_parts(
        provider_type: ProviderType,
        doctor_id: Option<i64>,
        home_care_provider_id: Option<i64>,
    ) -> CoreResult<Self> {
        match (provider_type, doctor_id, home_care_provider_id) {
            (_, Some(_), Some(_)) => Err(CoreError::Validation(
                "only one of doctor_id or home_care_provider_id may be set".into(),
            )),
            (ProviderType::Doctor, Some(id), None) => {
                require_id("doctor_id", id)?;
                Ok(Self::Doctor(id))
            }
            (ProviderType::HomeCareProvider, None, Some(id)) => {
                require_id("home_care_provider_id", id)?;
                Ok(Self::HomeCareProvider(id))
            }
            (ProviderType::Doctor, _, _) => Err(CoreError::Validation(
                "doctor_id is required when provider_type is doctor".into(),
            )),
            (ProviderType::HomeCareProvider, _, _) => Err(CoreError::Validation(
                "home_care_provider_id is required when provider_type is home_care_provider"
                    .into(),
            )),
        }
    }

    pub fn provider_type(self) -> ProviderType {
        match self {
            Self::Doctor(_) => ProviderType::Doctor,
            Self::HomeCareProvider(_) => ProviderType::HomeCareProvider,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::Doctor(id) | Self::HomeCareProvider(id) => id,
        }
    }

    pub fn doctor_id(self) -> Option<i64> {
        match self {
            Self::Doctor(id) => Some(id),
            Self::HomeCareProvider(_) => None,
        }
    }

    pub fn home_care_provider_id(self) -> Option<i64> {
        match self {
            Self::HomeCareProvider(id) => Some(id),
            Self::Doctor(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Scheduled)
    }

    /// Legal moves: scheduled to completed or cancelled. Both targets are terminal.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Scheduled, Self::Completed) | (Self::Scheduled, Self::Cancelled)
        )
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::Validation(format!(
                "unknown appointment status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: i64,
    pub provider: ProviderRef,
    pub service_type_id: Option<i64>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Half-open interval overlap on the same date: touching slots do not collide.
    pub fn overlaps(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        self.date == date && self.start_time < end && start < self.end_time
    }
}

/// Booking request as received from a patient.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub provider_type: ProviderType,
    pub doctor_id: Option<i64>,
    pub home_care_provider_id: Option<i64>,
    pub service_type_id: Option<i64>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Reschedule request. The patient of a booking never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentUpdate {
    pub provider_type: ProviderType,
    pub doctor_id: Option<i64>,
    pub home_care_provider_id: Option<i64>,
    pub service_type_id: Option<i64>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub provider_type: Option<ProviderType>,
    pub provider: Option<ProviderRef>,
    pub patient_id: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.status.map_or(true, |s| appointment.status == s)
            && self
                .provider_type
                .map_or(true, |t| appointment.provider.provider_type() == t)
            && self.provider.map_or(true, |p| appointment.provider == p)
            && self.patient_id.map_or(true, |p| appointment.patient_id == p)
            && self.date_from.map_or(true, |d| appointment.date >= d)
            && self.date_to.map_or(true, |d| appointment.date <= d)
    }
}

/// Checks the time window of a slot.
pub(crate) fn validate_window(start: NaiveTime, end: NaiveTime) -> CoreResult<()> {
    if end <= start {
        return Err(CoreError::Validation(
            "end time must be after start time".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn provider_ref_requires_matching_id() {
        assert_eq!(
            ProviderRef::from_parts(ProviderType::Doctor, Some(10), None).unwrap(),
            ProviderRef::Doctor(10)
        );
        assert!(ProviderRef::from_parts(ProviderType::Doctor, None, Some(3)).is_err());
        assert!(ProviderRef::from_parts(ProviderType::Doctor, Some(10), Some(3)).is_err());
        assert!(ProviderRef::from_parts(ProviderType::HomeCareProvider, None, None).is_err());
        assert!(ProviderRef::from_parts(ProviderType::Doctor, Some(0), None).is_err());
    }

    #[test]
    fn status_transitions_only_leave_scheduled() {
        use AppointmentStatus::*;
        assert!(Scheduled.can_transition_to(Completed));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Scheduled));
        assert!(!Scheduled.can_transition_to(Scheduled));
    }

    #[test]
    fn touching_slots_do_not_overlap() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let appointment = Appointment {
            id: 1,
            patient_id: 1,
            provider: ProviderRef::Doctor(10),
            service_type_id: None,
            date,
            start_time: time(9, 0),
            end_time: time(9, 30),
            status: AppointmentStatus::Scheduled,
            cancellation_reason: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!appointment.overlaps(date, time(9, 30), time(10, 0)));
        assert!(appointment.overlaps(date, time(9, 15), time(9, 45)));
        assert!(!appointment.overlaps(date.succ_opt().unwrap(), time(9, 0), time(9, 30)));
    }

    #[test]
    fn window_requires_end_after_start() {
        assert!(validate_window(time(9, 0), time(9, 30)).is_ok());
        assert!(validate_window(time(9, 30), time(9, 30)).is_err());
        assert!(validate_window(time(10, 0), time(9, 30)).is_err());
    }
}

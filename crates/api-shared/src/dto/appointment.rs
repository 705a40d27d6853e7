use carebook_core::models::{
    Appointment, AppointmentFilter, AppointmentUpdate, NewAppointment, ProviderType,
};
use carebook_core::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::parse_opt;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateAppointmentReq {
    pub patient_id: i64,
    /// `doctor` or `home_care_provider`.
    pub provider_type: String,
    pub doctor_id: Option<i64>,
    pub home_care_provider_id: Option<i64>,
    pub service_type_id: Option<i64>,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "09:30:00")]
    pub end_time: NaiveTime,
}

impl TryFrom<CreateAppointmentReq> for NewAppointment {
    type Error = CoreError;

    fn try_from(req: CreateAppointmentReq) -> CoreResult<Self> {
        Ok(NewAppointment {
            patient_id: req.patient_id,
            provider_type: req.provider_type.parse::<ProviderType>()?,
            doctor_id: req.doctor_id,
            home_care_provider_id: req.home_care_provider_id,
            service_type_id: req.service_type_id,
            date: req.date,
            start_time: req.start_time,
            end_time: req.end_time,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateAppointmentReq {
    pub provider_type: String,
    pub doctor_id: Option<i64>,
    pub home_care_provider_id: Option<i64>,
    pub service_type_id: Option<i64>,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "10:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:30:00")]
    pub end_time: NaiveTime,
    /// Version the caller last read; a mismatch is rejected with 409.
    pub expected_version: Option<u64>,
}

impl TryFrom<UpdateAppointmentReq> for AppointmentUpdate {
    type Error = CoreError;

    fn try_from(req: UpdateAppointmentReq) -> CoreResult<Self> {
        Ok(AppointmentUpdate {
            provider_type: req.provider_type.parse::<ProviderType>()?,
            doctor_id: req.doctor_id,
            home_care_provider_id: req.home_care_provider_id,
            service_type_id: req.service_type_id,
            date: req.date,
            start_time: req.start_time,
            end_time: req.end_time,
            expected_version: req.expected_version,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CancelAppointmentReq {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AppointmentQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub status: Option<String>,
    pub provider_type: Option<String>,
    pub patient_id: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl AppointmentQuery {
    pub fn filter(&self) -> CoreResult<AppointmentFilter> {
        Ok(AppointmentFilter {
            status: parse_opt(self.status.as_deref())?,
            provider_type: parse_opt(self.provider_type.as_deref())?,
            provider: None,
            patient_id: self.patient_id,
            date_from: self.date_from,
            date_to: self.date_to,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AppointmentRes {
    pub id: i64,
    pub patient_id: i64,
    pub provider_type: String,
    pub doctor_id: Option<i64>,
    pub home_care_provider_id: Option<i64>,
    pub service_type_id: Option<i64>,
    pub date: NaiveDate,
    #[schema(value_type = String)]
    pub start_time: NaiveTime,
    #[schema(value_type = String)]
    pub end_time: NaiveTime,
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Appointment> for AppointmentRes {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id,
            patient_id: a.patient_id,
            provider_type: a.provider.provider_type().to_string(),
            doctor_id: a.provider.doctor_id(),
            home_care_provider_id: a.provider.home_care_provider_id(),
            service_type_id: a.service_type_id,
            date: a.date,
            start_time: a.start_time,
            end_time: a.end_time,
            status: a.status.to_string(),
            cancellation_reason: a.cancellation_reason,
            version: a.version,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_rejects_unknown_provider_type() {
        let req: CreateAppointmentReq = serde_json::from_value(serde_json::json!({
            "patient_id": 1,
            "provider_type": "nurse",
            "doctor_id": 10,
            "date": "2025-03-01",
            "start_time": "09:00:00",
            "end_time": "09:30:00"
        }))
        .unwrap();
        let err = NewAppointment::try_from(req).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn query_parses_status_filter() {
        let query = AppointmentQuery {
            status: Some("cancelled".into()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.status.map(|s| s.as_str()), Some("cancelled"));

        let bad = AppointmentQuery {
            status: Some("postponed".into()),
            ..Default::default()
        };
        assert!(bad.filter().is_err());
    }
}

use carebook_core::models::{
    CompleteVisit, HomeCareVisit, HomeCareVisitUpdate, NewHomeCareVisit, VisitFilter,
};
use carebook_core::CoreResult;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::parse_opt;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduleVisitReq {
    pub patient_id: i64,
    pub provider_id: i64,
    /// Home-care booking this visit fulfils, if any.
    pub appointment_id: Option<i64>,
    pub visit_date: NaiveDate,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[schema(example = 2.0)]
    pub duration_hours: f64,
    pub special_requirements: Option<String>,
}

impl From<ScheduleVisitReq> for NewHomeCareVisit {
    fn from(req: ScheduleVisitReq) -> Self {
        NewHomeCareVisit {
            patient_id: req.patient_id,
            provider_id: req.provider_id,
            appointment_id: req.appointment_id,
            visit_date: req.visit_date,
            address: req.address,
            latitude: req.latitude,
            longitude: req.longitude,
            duration_hours: req.duration_hours,
            special_requirements: req.special_requirements,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateVisitReq {
    pub visit_date: NaiveDate,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub duration_hours: f64,
    pub special_requirements: Option<String>,
    pub expected_version: Option<u64>,
}

impl From<UpdateVisitReq> for HomeCareVisitUpdate {
    fn from(req: UpdateVisitReq) -> Self {
        HomeCareVisitUpdate {
            visit_date: req.visit_date,
            address: req.address,
            latitude: req.latitude,
            longitude: req.longitude,
            duration_hours: req.duration_hours,
            special_requirements: req.special_requirements,
            expected_version: req.expected_version,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CompleteVisitReq {
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub settle_payment: bool,
}

impl From<CompleteVisitReq> for CompleteVisit {
    fn from(req: CompleteVisitReq) -> Self {
        CompleteVisit {
            expected_version: req.expected_version,
            settle_payment: req.settle_payment,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VisitQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub patient_id: Option<i64>,
    pub provider_id: Option<i64>,
    pub status: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl VisitQuery {
    pub fn filter(&self) -> CoreResult<VisitFilter> {
        Ok(VisitFilter {
            patient_id: self.patient_id,
            provider_id: self.provider_id,
            status: parse_opt(self.status.as_deref())?,
            date_from: self.date_from,
            date_to: self.date_to,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VisitRes {
    pub id: i64,
    pub patient_id: i64,
    pub provider_id: i64,
    pub appointment_id: Option<i64>,
    pub visit_date: NaiveDate,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub duration_hours: f64,
    pub special_requirements: Option<String>,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl From<HomeCareVisit> for VisitRes {
    fn from(v: HomeCareVisit) -> Self {
        Self {
            id: v.id,
            patient_id: v.patient_id,
            provider_id: v.provider_id,
            appointment_id: v.appointment_id,
            visit_date: v.visit_date,
            address: v.address.into_inner(),
            latitude: v.latitude,
            longitude: v.longitude,
            duration_hours: v.duration_hours,
            special_requirements: v.special_requirements,
            status: v.status.to_string(),
            started_at: v.started_at,
            completed_at: v.completed_at,
            version: v.version,
        }
    }
}

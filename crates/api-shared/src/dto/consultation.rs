use carebook_core::models::{
    CompleteConsultation, Consultation, ConsultationFilter, NewConsultation,
};
use carebook_core::CoreResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::parse_opt;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartConsultationReq {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub appointment_id: Option<i64>,
    #[schema(example = "video")]
    pub consultation_type: String,
    pub notes: Option<String>,
    pub fee: Option<f64>,
}

impl From<StartConsultationReq> for NewConsultation {
    fn from(req: StartConsultationReq) -> Self {
        NewConsultation {
            patient_id: req.patient_id,
            doctor_id: req.doctor_id,
            appointment_id: req.appointment_id,
            consultation_type: req.consultation_type,
            notes: req.notes,
            fee: req.fee,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CompleteConsultationReq {
    pub notes: Option<String>,
    pub expected_version: Option<u64>,
    /// Also mark the consultation's pending payment as paid.
    #[serde(default)]
    pub settle_payment: bool,
}

impl From<CompleteConsultationReq> for CompleteConsultation {
    fn from(req: CompleteConsultationReq) -> Self {
        CompleteConsultation {
            notes: req.notes,
            expected_version: req.expected_version,
            settle_payment: req.settle_payment,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConsultationQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub patient_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub status: Option<String>,
}

impl ConsultationQuery {
    pub fn filter(&self) -> CoreResult<ConsultationFilter> {
        Ok(ConsultationFilter {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            status: parse_opt(self.status.as_deref())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConsultationRes {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub appointment_id: Option<i64>,
    pub consultation_type: String,
    pub notes: Option<String>,
    pub fee: Option<f64>,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl From<Consultation> for ConsultationRes {
    fn from(c: Consultation) -> Self {
        Self {
            id: c.id,
            patient_id: c.patient_id,
            doctor_id: c.doctor_id,
            appointment_id: c.appointment_id,
            consultation_type: c.consultation_type.into_inner(),
            notes: c.notes,
            fee: c.fee.map(|f| f.get()),
            status: c.status.to_string(),
            started_at: c.started_at,
            completed_at: c.completed_at,
            version: c.version,
        }
    }
}

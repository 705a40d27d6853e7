use carebook_core::models::{
    Doctor, HomeCareProvider, NewDoctor, NewHomeCareProvider, ProviderFilter,
    ProviderStatusUpdate,
};
use carebook_core::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::parse_opt;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateDoctorReq {
    /// User id of the doctor's account; becomes the doctor id.
    pub user_id: i64,
    pub name: String,
    pub specialty: String,
    pub consultation_fee: Option<f64>,
}

impl From<CreateDoctorReq> for NewDoctor {
    fn from(req: CreateDoctorReq) -> Self {
        NewDoctor {
            user_id: req.user_id,
            name: req.name,
            specialty: req.specialty,
            consultation_fee: req.consultation_fee,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateHomeCareProviderReq {
    pub user_id: i64,
    pub name: String,
    pub hourly_rate: Option<f64>,
}

impl From<CreateHomeCareProviderReq> for NewHomeCareProvider {
    fn from(req: CreateHomeCareProviderReq) -> Self {
        NewHomeCareProvider {
            user_id: req.user_id,
            name: req.name,
            hourly_rate: req.hourly_rate,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProviderStatusReq {
    /// `active`, `inactive` or `suspended`.
    pub status: Option<String>,
    pub is_available: Option<bool>,
}

impl TryFrom<UpdateProviderStatusReq> for ProviderStatusUpdate {
    type Error = CoreError;

    fn try_from(req: UpdateProviderStatusReq) -> CoreResult<Self> {
        Ok(ProviderStatusUpdate {
            status: parse_opt(req.status.as_deref())?,
            is_available: req.is_available,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProviderQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub status: Option<String>,
    pub is_available: Option<bool>,
}

impl ProviderQuery {
    pub fn filter(&self) -> CoreResult<ProviderFilter> {
        Ok(ProviderFilter {
            status: parse_opt(self.status.as_deref())?,
            is_available: self.is_available,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DoctorRes {
    pub id: i64,
    pub name: String,
    pub specialty: String,
    pub consultation_fee: Option<f64>,
    pub status: String,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Doctor> for DoctorRes {
    fn from(d: Doctor) -> Self {
        Self {
            id: d.id,
            name: d.name.into_inner(),
            specialty: d.specialty.into_inner(),
            consultation_fee: d.consultation_fee.map(|f| f.get()),
            status: d.status.to_string(),
            is_available: d.is_available,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HomeCareProviderRes {
    pub id: i64,
    pub name: String,
    pub hourly_rate: Option<f64>,
    pub status: String,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<HomeCareProvider> for HomeCareProviderRes {
    fn from(p: HomeCareProvider) -> Self {
        Self {
            id: p.id,
            name: p.name.into_inner(),
            hourly_rate: p.hourly_rate.map(|r| r.get()),
            status: p.status.to_string(),
            is_available: p.is_available,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

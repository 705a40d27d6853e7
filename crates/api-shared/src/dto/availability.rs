use carebook_core::models::{AvailabilityUpdate, DoctorAvailability, NewAvailability};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetAvailabilityReq {
    pub doctor_id: i64,
    /// 0 = Sunday through 6 = Saturday.
    #[schema(minimum = 0, maximum = 6)]
    pub day_of_week: i64,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "12:00:00")]
    pub end_time: NaiveTime,
}

impl From<SetAvailabilityReq> for NewAvailability {
    fn from(req: SetAvailabilityReq) -> Self {
        NewAvailability {
            doctor_id: req.doctor_id,
            day_of_week: req.day_of_week,
            start_time: req.start_time,
            end_time: req.end_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateAvailabilityReq {
    #[schema(minimum = 0, maximum = 6)]
    pub day_of_week: i64,
    #[schema(value_type = String)]
    pub start_time: NaiveTime,
    #[schema(value_type = String)]
    pub end_time: NaiveTime,
}

impl From<UpdateAvailabilityReq> for AvailabilityUpdate {
    fn from(req: UpdateAvailabilityReq) -> Self {
        AvailabilityUpdate {
            day_of_week: req.day_of_week,
            start_time: req.start_time,
            end_time: req.end_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityRes {
    pub id: i64,
    pub doctor_id: i64,
    pub day_of_week: u8,
    #[schema(value_type = String)]
    pub start_time: NaiveTime,
    #[schema(value_type = String)]
    pub end_time: NaiveTime,
}

impl From<DoctorAvailability> for AvailabilityRes {
    fn from(w: DoctorAvailability) -> Self {
        Self {
            id: w.id,
            doctor_id: w.doctor_id,
            day_of_week: w.day_of_week,
            start_time: w.start_time,
            end_time: w.end_time,
        }
    }
}

use carebook_core::models::{NewReview, ProviderType, RatingSummary, Review, ReviewUpdate};
use carebook_core::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateReviewReq {
    pub patient_id: i64,
    /// `doctor` or `home_care_provider`.
    pub review_type: String,
    pub doctor_id: Option<i64>,
    pub home_care_provider_id: Option<i64>,
    pub consultation_id: Option<i64>,
    pub home_care_visit_id: Option<i64>,
    #[schema(minimum = 1, maximum = 5)]
    pub rating: i64,
    pub comment: Option<String>,
}

impl TryFrom<CreateReviewReq> for NewReview {
    type Error = CoreError;

    fn try_from(req: CreateReviewReq) -> CoreResult<Self> {
        Ok(NewReview {
            patient_id: req.patient_id,
            review_type: req.review_type.parse::<ProviderType>()?,
            doctor_id: req.doctor_id,
            home_care_provider_id: req.home_care_provider_id,
            consultation_id: req.consultation_id,
            home_care_visit_id: req.home_care_visit_id,
            rating: req.rating,
            comment: req.comment,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateReviewReq {
    #[schema(minimum = 1, maximum = 5)]
    pub rating: i64,
    pub comment: Option<String>,
}

impl From<UpdateReviewReq> for ReviewUpdate {
    fn from(req: UpdateReviewReq) -> Self {
        ReviewUpdate {
            rating: req.rating,
            comment: req.comment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReviewRes {
    pub id: i64,
    pub patient_id: i64,
    pub review_type: String,
    pub doctor_id: Option<i64>,
    pub home_care_provider_id: Option<i64>,
    pub consultation_id: Option<i64>,
    pub home_care_visit_id: Option<i64>,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Review> for ReviewRes {
    fn from(r: Review) -> Self {
        Self {
            id: r.id,
            patient_id: r.patient_id,
            review_type: r.provider.provider_type().to_string(),
            doctor_id: r.provider.doctor_id(),
            home_care_provider_id: r.provider.home_care_provider_id(),
            consultation_id: r.encounter.and_then(|e| e.consultation_id()),
            home_care_visit_id: r.encounter.and_then(|e| e.home_care_visit_id()),
            rating: r.rating.get(),
            comment: r.comment,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RatingRes {
    pub review_type: String,
    pub provider_id: i64,
    /// Absent when the provider has no reviews.
    pub average: Option<f64>,
    pub count: usize,
}

impl From<RatingSummary> for RatingRes {
    fn from(s: RatingSummary) -> Self {
        Self {
            review_type: s.provider.provider_type().to_string(),
            provider_id: s.provider.id(),
            average: s.average,
            count: s.count,
        }
    }
}

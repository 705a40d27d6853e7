use carebook_types::Rating;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EncounterRef, ProviderRef, ProviderType};

/// Patient feedback about a doctor or home-care provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub patient_id: i64,
    pub provider: ProviderRef,
    pub encounter: Option<EncounterRef>,
    pub rating: Rating,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub patient_id: i64,
    pub review_type: ProviderType,
    pub doctor_id: Option<i64>,
    pub home_care_provider_id: Option<i64>,
    pub consultation_id: Option<i64>,
    pub home_care_visit_id: Option<i64>,
    /// Raw value; checked against the 1 to 5 scale.
    pub rating: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewUpdate {
    pub rating: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub provider: ProviderRef,
    /// `None` when the provider has no reviews.
    pub average: Option<f64>,
    pub count: usize,
}

//! Provider directory: doctors and home-care providers.
//!
//! Provider rows are keyed by the provider's user id, so the id carried in a bearer
//! token is the same id used on bookings.

use carebook_types::{Amount, NonEmptyText};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Active,
    Inactive,
    Suspended,
}

impl ProviderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "suspended" => Ok(Self::Suspended),
            other => Err(CoreError::Validation(format!(
                "unknown provider status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub name: NonEmptyText,
    pub specialty: NonEmptyText,
    pub consultation_fee: Option<Amount>,
    pub status: ProviderStatus,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn is_bookable(&self) -> bool {
        self.status == ProviderStatus::Active && self.is_available
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeCareProvider {
    pub id: i64,
    pub name: NonEmptyText,
    pub hourly_rate: Option<Amount>,
    pub status: ProviderStatus,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HomeCareProvider {
    pub fn is_bookable(&self) -> bool {
        self.status == ProviderStatus::Active && self.is_available
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDoctor {
    pub user_id: i64,
    pub name: String,
    pub specialty: String,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHomeCareProvider {
    pub user_id: i64,
    pub name: String,
    pub hourly_rate: Option<f64>,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderStatusUpdate {
    pub status: Option<ProviderStatus>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderFilter {
    pub status: Option<ProviderStatus>,
    pub is_available: Option<bool>,
}

impl ProviderFilter {
    pub fn matches(&self, status: ProviderStatus, is_available: bool) -> bool {
        self.status.map_or(true, |s| s == status)
            && self.is_available.map_or(true, |a| a == is_available)
    }
}

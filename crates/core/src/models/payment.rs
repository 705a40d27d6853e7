//! Payments raised against a consultation or a home-care visit.

use carebook_types::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
        }
    }

    /// Status only moves forward: pending, then paid, then refunded.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid) | (Self::Paid, Self::Refunded)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "refunded" => Ok(Self::Refunded),
            other => Err(CoreError::Validation(format!(
                "unknown payment status '{other}'"
            ))),
        }
    }
}

/// The encounter a payment bills for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EncounterRef {
    Consultation(i64),
    HomeCareVisit(i64),
}

impl EncounterRef {
    /// Exactly one of the two ids must be given.
    pub fn from_parts(
        consultation_id: Option<i64>,
        home_care_visit_id: Option<i64>,
    ) -> CoreResult<Self> {
        match (consultation_id, home_care_visit_id) {
            (Some(id), None) if id > 0 => Ok(Self::Consultation(id)),
            (None, Some(id)) if id > 0 => Ok(Self::HomeCareVisit(id)),
            (Some(_), Some(_)) => Err(CoreError::Validation(
                "only one of consultation_id or home_care_visit_id may be set".into(),
            )),
            _ => Err(CoreError::Validation(
                "either consultation_id or home_care_visit_id is required".into(),
            )),
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::Consultation(id) | Self::HomeCareVisit(id) => id,
        }
    }

    pub fn consultation_id(self) -> Option<i64> {
        match self {
            Self::Consultation(id) => Some(id),
            Self::HomeCareVisit(_) => None,
        }
    }

    pub fn home_care_visit_id(self) -> Option<i64> {
        match self {
            Self::HomeCareVisit(id) => Some(id),
            Self::Consultation(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub target: EncounterRef,
    pub payment_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refund_date: Option<DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub amount: f64,
    pub consultation_id: Option<i64>,
    pub home_care_visit_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encounter_ref_requires_exactly_one_target() {
        assert_eq!(
            EncounterRef::from_parts(Some(3), None).unwrap(),
            EncounterRef::Consultation(3)
        );
        assert_eq!(
            EncounterRef::from_parts(None, Some(8)).unwrap(),
            EncounterRef::HomeCareVisit(8)
        );
        assert!(EncounterRef::from_parts(Some(3), Some(8)).is_err());
        assert!(EncounterRef::from_parts(None, None).is_err());
        assert!(EncounterRef::from_parts(Some(0), None).is_err());
    }

    #[test]
    fn status_is_monotonic() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Refunded));
        assert!(!Pending.can_transition_to(Refunded));
        assert!(!Refunded.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Pending));
    }
}

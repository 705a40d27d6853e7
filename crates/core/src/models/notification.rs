use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AppointmentCreated,
    AppointmentUpdated,
    AppointmentCancelled,
    ConsultationStarted,
    ConsultationCompleted,
    VisitScheduled,
    VisitCancelled,
    PaymentCaptured,
    PaymentRefunded,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AppointmentCreated => "appointment_created",
            Self::AppointmentUpdated => "appointment_updated",
            Self::AppointmentCancelled => "appointment_cancelled",
            Self::ConsultationStarted => "consultation_started",
            Self::ConsultationCompleted => "consultation_completed",
            Self::VisitScheduled => "visit_scheduled",
            Self::VisitCancelled => "visit_cancelled",
            Self::PaymentCaptured => "payment_captured",
            Self::PaymentRefunded => "payment_refunded",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::AppointmentCreated,
            Self::AppointmentUpdated,
            Self::AppointmentCancelled,
            Self::ConsultationStarted,
            Self::ConsultationCompleted,
            Self::VisitScheduled,
            Self::VisitCancelled,
            Self::PaymentCaptured,
            Self::PaymentRefunded,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == s)
        .ok_or_else(|| CoreError::Validation(format!("unknown notification kind '{s}'")))
    }
}

/// In-app notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

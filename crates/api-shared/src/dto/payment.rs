use carebook_core::models::{NewPayment, Payment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Exactly one of `consultation_id` and `home_care_visit_id` must be set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentReq {
    #[schema(example = 50.0)]
    pub amount: f64,
    pub consultation_id: Option<i64>,
    pub home_care_visit_id: Option<i64>,
}

impl From<CreatePaymentReq> for NewPayment {
    fn from(req: CreatePaymentReq) -> Self {
        NewPayment {
            amount: req.amount,
            consultation_id: req.consultation_id,
            home_care_visit_id: req.home_care_visit_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusReq {
    /// `pending`, `paid` or `refunded`; only forward transitions are accepted.
    pub status: String,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentRes {
    pub id: i64,
    pub amount: f64,
    pub status: String,
    pub consultation_id: Option<i64>,
    pub home_care_visit_id: Option<i64>,
    pub payment_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refund_date: Option<DateTime<Utc>>,
    pub version: u64,
}

impl From<Payment> for PaymentRes {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            amount: p.amount.get(),
            status: p.status.to_string(),
            consultation_id: p.target.consultation_id(),
            home_care_visit_id: p.target.home_care_visit_id(),
            payment_date: p.payment_date,
            paid_at: p.paid_at,
            refund_date: p.refund_date,
            version: p.version,
        }
    }
}

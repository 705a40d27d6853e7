//! Payments: `pending`, then `paid`, then optionally `refunded`.

use carebook_types::Amount;
use chrono::Utc;

use super::consultation::settle_payment;
use super::notification::record;
use super::{check_version, found, ServiceContext};
use crate::auth::{Action, Actor, Parties};
use crate::constants::{CONSULTATION, HOME_CARE_VISIT, PAYMENT};
use crate::models::{
    EncounterRef, NewPayment, NotificationKind, Payment, PaymentStatus, VisitStatus,
};
use crate::repositories::{Database, Repositories};
use crate::{CoreError, CoreResult};

#[derive(Debug)]
pub struct PaymentService<D> {
    ctx: ServiceContext<D>,
}

impl<D: Database> PaymentService<D> {
    pub fn new(ctx: ServiceContext<D>) -> Self {
        Self { ctx }
    }

    /// Raises a pending payment for a consultation or a home-care visit.
    ///
    /// # Errors
    ///
    /// - `InvalidValue` for a non-positive amount, `Validation` unless exactly one
    ///   encounter is referenced.
    /// - `NotFound` for an unknown encounter, `InvalidState` for a cancelled visit.
    /// - `Conflict` if the encounter already has a payment.
    pub fn create(&self, actor: &Actor, new: NewPayment) -> CoreResult<Payment> {
        let amount = Amount::new(new.amount)?;
        let target = EncounterRef::from_parts(new.consultation_id, new.home_care_visit_id)?;

        let result = self.ctx.db.transaction(|tx| {
            let (parties, cancelled) = encounter_parties(tx, target)?;
            self.ctx
                .authorizer
                .authorize(actor, Action::CreatePayment, &parties)?;
            if cancelled {
                return Err(CoreError::InvalidState(format!(
                    "{target:?} is cancelled and cannot be billed"
                )));
            }
            if let Some(existing) = tx.payment_for(target)? {
                return Err(CoreError::Conflict(format!(
                    "{target:?} already has payment {}",
                    existing.id
                )));
            }

            let now = Utc::now();
            tx.insert_payment(Payment {
                id: 0,
                amount,
                status: PaymentStatus::Pending,
                target,
                payment_date: now,
                paid_at: None,
                refund_date: None,
                version: 0,
                created_at: now,
                updated_at: now,
            })
        });

        match &result {
            Ok(p) => tracing::info!(payment_id = p.id, amount = %p.amount, "payment created"),
            Err(e) if e.is_domain() => tracing::warn!("payment rejected: {}", e),
            Err(e) => tracing::error!("payment creation failed: {:?}", e),
        }
        result
    }

    pub fn get(&self, actor: &Actor, id: i64) -> CoreResult<Payment> {
        self.ctx.db.transaction(|tx| {
            let payment = found(tx.payment(id)?, PAYMENT, id)?;
            let (parties, _) = encounter_parties(tx, payment.target)?;
            self.ctx
                .authorizer
                .authorize(actor, Action::ViewPayment, &parties)?;
            Ok(payment)
        })
    }

    /// The payment raised for an encounter.
    pub fn for_encounter(&self, actor: &Actor, target: EncounterRef) -> CoreResult<Payment> {
        self.ctx.db.transaction(|tx| {
            let (parties, _) = encounter_parties(tx, target)?;
            self.ctx
                .authorizer
                .authorize(actor, Action::ViewPayment, &parties)?;
            found(tx.payment_for(target)?, PAYMENT, target.id())
        })
    }

    /// Pending to paid.
    pub fn capture(&self, actor: &Actor, id: i64) -> CoreResult<Payment> {
        self.transition(actor, id, PaymentStatus::Paid, None)
    }

    /// Paid to refunded.
    ///
    /// # Errors
    ///
    /// `IneligibleRefund` unless the payment is currently `paid`.
    pub fn refund(&self, actor: &Actor, id: i64) -> CoreResult<Payment> {
        self.transition(actor, id, PaymentStatus::Refunded, None)
    }

    /// Moves a payment along the pending, paid, refunded sequence.
    ///
    /// Moving to `refunded` behaves exactly like [`PaymentService::refund`]. Any other
    /// move that is not the next step fails with `InvalidState`.
    pub fn update_status(
        &self,
        actor: &Actor,
        id: i64,
        status: PaymentStatus,
        expected_version: Option<u64>,
    ) -> CoreResult<Payment> {
        self.transition(actor, id, status, expected_version)
    }

    fn transition(
        &self,
        actor: &Actor,
        id: i64,
        next: PaymentStatus,
        expected_version: Option<u64>,
    ) -> CoreResult<Payment> {
        let result = self.ctx.db.transaction(|tx| {
            let current = found(tx.payment(id)?, PAYMENT, id)?;
            let action = match next {
                PaymentStatus::Refunded => Action::RefundPayment,
                PaymentStatus::Paid | PaymentStatus::Pending => Action::CapturePayment,
            };
            let (parties, _) = encounter_parties(tx, current.target)?;
            self.ctx.authorizer.authorize(actor, action, &parties)?;
            check_version(expected_version, current.version, PAYMENT, id)?;

            let (updated, kind) = match next {
                PaymentStatus::Refunded => {
                    if current.status != PaymentStatus::Paid {
                        return Err(CoreError::IneligibleRefund {
                            payment_id: id,
                            status: current.status,
                        });
                    }
                    let now = Utc::now().max(current.payment_date);
                    let refunded = tx.update_payment(Payment {
                        status: PaymentStatus::Refunded,
                        refund_date: Some(now),
                        updated_at: now,
                        ..current
                    })?;
                    (refunded, NotificationKind::PaymentRefunded)
                }
                PaymentStatus::Paid => {
                    if !current.status.can_transition_to(PaymentStatus::Paid) {
                        return Err(CoreError::InvalidState(format!(
                            "payment {id} is {}, expected pending",
                            current.status
                        )));
                    }
                    (
                        settle_payment(tx, current.target)?,
                        NotificationKind::PaymentCaptured,
                    )
                }
                PaymentStatus::Pending => {
                    return Err(CoreError::InvalidState(format!(
                        "payment {id} cannot move from {} back to pending",
                        current.status
                    )))
                }
            };

            if let Some(patient_id) = parties.patient_id {
                record(
                    tx,
                    patient_id,
                    kind,
                    format!("Payment {} is now {}", updated.id, updated.status),
                )?;
            }
            Ok(updated)
        });

        match &result {
            Ok(p) => tracing::info!(payment_id = p.id, status = %p.status, "payment updated"),
            Err(e) if e.is_domain() => {
                tracing::warn!(payment_id = id, "payment transition to {} rejected: {}", next, e)
            }
            Err(e) => tracing::error!("payment transition failed: {:?}", e),
        }
        result
    }
}

/// Parties of the encounter a payment bills for, and whether it was cancelled.
fn encounter_parties(tx: &dyn Repositories, target: EncounterRef) -> CoreResult<(Parties, bool)> {
    match target {
        EncounterRef::Consultation(id) => {
            let consultation = found(tx.consultation(id)?, CONSULTATION, id)?;
            Ok((Parties::of_consultation(&consultation), false))
        }
        EncounterRef::HomeCareVisit(id) => {
            let visit = found(tx.visit(id)?, HOME_CARE_VISIT, id)?;
            Ok((
                Parties::of_visit(&visit),
                visit.status == VisitStatus::Cancelled,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompleteConsultation, NewConsultation};
    use crate::repositories::LocalDatabase;
    use crate::services::test_support::*;
    use crate::services::CoreServices;

    fn consultation_payment(services: &CoreServices<LocalDatabase>) -> Payment {
        let consultation = services
            .consultations
            .start(
                &doctor(),
                NewConsultation {
                    patient_id: PATIENT,
                    doctor_id: DOCTOR_ID,
                    appointment_id: None,
                    consultation_type: "in person".into(),
                    notes: None,
                    fee: None,
                },
            )
            .expect("start should succeed");
        services
            .payments
            .create(
                &patient(),
                NewPayment {
                    amount: 50.0,
                    consultation_id: Some(consultation.id),
                    home_care_visit_id: None,
                },
            )
            .expect("payment should succeed")
    }

    #[test]
    fn create_validates_amount_and_target() {
        let services = services();
        let err = services
            .payments
            .create(
                &patient(),
                NewPayment {
                    amount: 0.0,
                    consultation_id: Some(1),
                    home_care_visit_id: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue(_)));

        let err = services
            .payments
            .create(
                &patient(),
                NewPayment {
                    amount: 10.0,
                    consultation_id: Some(1),
                    home_care_visit_id: Some(1),
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = services
            .payments
            .create(
                &patient(),
                NewPayment {
                    amount: 10.0,
                    consultation_id: Some(404),
                    home_care_visit_id: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn one_payment_per_encounter() {
        let services = services();
        let payment = consultation_payment(&services);
        let err = services
            .payments
            .create(
                &patient(),
                NewPayment {
                    amount: 5.0,
                    consultation_id: payment.target.consultation_id(),
                    home_care_visit_id: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn refund_requires_paid() {
        let services = services();
        let payment = consultation_payment(&services);

        let err = services.payments.refund(&admin(), payment.id).unwrap_err();
        assert!(matches!(
            err,
            CoreError::IneligibleRefund {
                status: PaymentStatus::Pending,
                ..
            }
        ));

        let paid = services
            .payments
            .capture(&admin(), payment.id)
            .expect("capture should succeed");
        assert_eq!(paid.status, PaymentStatus::Paid);

        let refunded = services
            .payments
            .refund(&admin(), payment.id)
            .expect("refund should succeed");
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        let refund_date = refunded.refund_date.expect("refund date should be set");
        assert!(refund_date >= refunded.payment_date);

        let err = services.payments.refund(&admin(), payment.id).unwrap_err();
        assert!(matches!(err, CoreError::IneligibleRefund { .. }));
    }

    #[test]
    fn update_status_follows_the_transition_table() {
        let services = services();
        let payment = consultation_payment(&services);

        let err = services
            .payments
            .update_status(&admin(), payment.id, PaymentStatus::Refunded, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::IneligibleRefund { .. }));

        let err = services
            .payments
            .update_status(&admin(), payment.id, PaymentStatus::Paid, Some(99))
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        let paid = services
            .payments
            .update_status(&admin(), payment.id, PaymentStatus::Paid, Some(payment.version))
            .expect("pending to paid should succeed");

        let err = services
            .payments
            .update_status(&admin(), paid.id, PaymentStatus::Pending, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn capture_and_refund_are_admin_only() {
        let services = services();
        let payment = consultation_payment(&services);
        let err = services.payments.capture(&doctor(), payment.id).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        let err = services.payments.refund(&patient(), payment.id).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[test]
    fn lookup_by_encounter() {
        let services = services();
        let payment = consultation_payment(&services);
        let found = services
            .payments
            .for_encounter(&patient(), payment.target)
            .expect("lookup should succeed");
        assert_eq!(found, payment);

        let consultation_id = payment.target.id();
        services
            .consultations
            .complete(&doctor(), consultation_id, CompleteConsultation::default())
            .expect("complete should succeed");
        let err = services
            .payments
            .for_encounter(&other_patient(), payment.target)
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }
}

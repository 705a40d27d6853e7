//! Consultation lifecycle: `in_progress` then `completed`, exactly once.

use carebook_types::{Amount, NonEmptyText};
use chrono::Utc;

use super::notification::record;
use super::{check_version, found, ServiceContext};
use crate::auth::{Action, Actor, Parties, Role};
use crate::constants::{APPOINTMENT, CONSULTATION, DOCTOR};
use crate::models::{
    require_id, Appointment, AppointmentStatus, CompleteConsultation, Consultation,
    ConsultationFilter, ConsultationStatus, EncounterRef, NewConsultation, NotificationKind,
    Payment, PaymentStatus, ProviderRef,
};
use crate::repositories::{Database, Page, Repositories};
use crate::{CoreError, CoreResult};

#[derive(Debug)]
pub struct ConsultationService<D> {
    ctx: ServiceContext<D>,
}

impl<D: Database> ConsultationService<D> {
    pub fn new(ctx: ServiceContext<D>) -> Self {
        Self { ctx }
    }

    /// Starts a consultation, optionally for a booking.
    ///
    /// A referenced booking must be a scheduled doctor booking between the same
    /// patient and doctor, and may only ever have one consultation.
    pub fn start(&self, actor: &Actor, new: NewConsultation) -> CoreResult<Consultation> {
        require_id("patient_id", new.patient_id)?;
        require_id("doctor_id", new.doctor_id)?;
        let consultation_type = NonEmptyText::new(&new.consultation_type).map_err(|_| {
            CoreError::Validation("consultation_type is required".into())
        })?;
        let fee = new.fee.map(Amount::new).transpose()?;

        self.ctx.authorizer.authorize(
            actor,
            Action::StartConsultation,
            &Parties::doctor(new.doctor_id).with_patient(new.patient_id),
        )?;

        let result = self.ctx.db.transaction(|tx| {
            found(tx.doctor(new.doctor_id)?, DOCTOR, new.doctor_id)?;

            if let Some(appointment_id) = new.appointment_id {
                let appointment =
                    found(tx.appointment(appointment_id)?, APPOINTMENT, appointment_id)?;
                if appointment.status != AppointmentStatus::Scheduled {
                    return Err(CoreError::InvalidState(format!(
                        "appointment {appointment_id} is {}",
                        appointment.status
                    )));
                }
                if appointment.provider != ProviderRef::Doctor(new.doctor_id)
                    || appointment.patient_id != new.patient_id
                {
                    return Err(CoreError::Validation(format!(
                        "appointment {appointment_id} is not between patient {} and doctor {}",
                        new.patient_id, new.doctor_id
                    )));
                }
                if let Some(existing) = tx.consultation_for_appointment(appointment_id)? {
                    return Err(CoreError::Conflict(format!(
                        "appointment {appointment_id} already has consultation {}",
                        existing.id
                    )));
                }
            }

            let now = Utc::now();
            let consultation = tx.insert_consultation(Consultation {
                id: 0,
                patient_id: new.patient_id,
                doctor_id: new.doctor_id,
                appointment_id: new.appointment_id,
                consultation_type,
                notes: new.notes,
                fee,
                status: ConsultationStatus::InProgress,
                started_at: now,
                completed_at: None,
                version: 0,
                created_at: now,
                updated_at: now,
            })?;
            record(
                tx,
                consultation.patient_id,
                NotificationKind::ConsultationStarted,
                format!("Consultation {} has started", consultation.id),
            )?;
            Ok(consultation)
        });

        match &result {
            Ok(c) => tracing::info!(
                consultation_id = c.id,
                appointment_id = ?c.appointment_id,
                "consultation started"
            ),
            Err(e) if e.is_domain() => tracing::warn!("consultation start rejected: {}", e),
            Err(e) => tracing::error!("consultation start failed: {:?}", e),
        }
        result
    }

    /// Completes an in-progress consultation.
    ///
    /// In the same transaction the linked booking becomes `completed` and, when
    /// `settle_payment` is set, the consultation's pending payment becomes `paid`. If
    /// any step fails nothing is written.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the consultation is `in_progress`, or when settlement was
    ///   requested and there is no pending payment.
    /// - `Conflict` when `expected_version` is stale.
    pub fn complete(
        &self,
        actor: &Actor,
        id: i64,
        request: CompleteConsultation,
    ) -> CoreResult<Consultation> {
        let result = self.ctx.db.transaction(|tx| {
            let current = found(tx.consultation(id)?, CONSULTATION, id)?;
            self.ctx.authorizer.authorize(
                actor,
                Action::CompleteConsultation,
                &Parties::of_consultation(&current),
            )?;
            if current.status != ConsultationStatus::InProgress {
                return Err(CoreError::InvalidState(format!(
                    "consultation {id} is {}, expected in_progress",
                    current.status
                )));
            }
            check_version(request.expected_version, current.version, CONSULTATION, id)?;

            let now = Utc::now().max(current.started_at);
            let completed = tx.update_consultation(Consultation {
                status: ConsultationStatus::Completed,
                completed_at: Some(now),
                notes: request.notes.or(current.notes.clone()),
                updated_at: now,
                ..current
            })?;

            if let Some(appointment_id) = completed.appointment_id {
                complete_appointment(tx, appointment_id)?;
            }
            if request.settle_payment {
                settle_payment(tx, EncounterRef::Consultation(id))?;
            }

            record(
                tx,
                completed.patient_id,
                NotificationKind::ConsultationCompleted,
                format!("Consultation {} is complete", completed.id),
            )?;
            Ok(completed)
        });

        match &result {
            Ok(c) => tracing::info!(consultation_id = c.id, "consultation completed"),
            Err(e) if e.is_domain() => {
                tracing::warn!(consultation_id = id, "completion rejected: {}", e)
            }
            Err(e) => tracing::error!("consultation completion failed: {:?}", e),
        }
        result
    }

    pub fn get(&self, actor: &Actor, id: i64) -> CoreResult<Consultation> {
        let consultation = self
            .ctx
            .db
            .transaction(|tx| found(tx.consultation(id)?, CONSULTATION, id))?;
        self.ctx.authorizer.authorize(
            actor,
            Action::ViewConsultation,
            &Parties::of_consultation(&consultation),
        )?;
        Ok(consultation)
    }

    /// Consultations ordered by start time, newest first, restricted to the actor's own.
    pub fn list(
        &self,
        actor: &Actor,
        mut filter: ConsultationFilter,
        page: Page,
    ) -> CoreResult<Vec<Consultation>> {
        match actor.role {
            Role::Admin => {}
            Role::Patient => filter.patient_id = Some(actor.user_id),
            Role::Doctor => filter.doctor_id = Some(actor.user_id),
            Role::HomeCareProvider => return Ok(Vec::new()),
        }
        self.ctx
            .db
            .transaction(|tx| tx.list_consultations(&filter, page))
    }
}

/// Marks the booking behind a finished encounter as completed.
pub(crate) fn complete_appointment(
    tx: &mut dyn Repositories,
    appointment_id: i64,
) -> CoreResult<()> {
    let appointment = found(tx.appointment(appointment_id)?, APPOINTMENT, appointment_id)?;
    if !appointment
        .status
        .can_transition_to(AppointmentStatus::Completed)
    {
        return Err(CoreError::InvalidState(format!(
            "appointment {appointment_id} is {} and cannot be completed",
            appointment.status
        )));
    }
    tx.update_appointment(Appointment {
        status: AppointmentStatus::Completed,
        updated_at: Utc::now(),
        ..appointment
    })?;
    Ok(())
}

/// Moves the encounter's pending payment to paid.
pub(crate) fn settle_payment(
    tx: &mut dyn Repositories,
    target: EncounterRef,
) -> CoreResult<Payment> {
    let payment = tx.payment_for(target)?.ok_or_else(|| {
        CoreError::InvalidState(format!("no payment has been raised for {target:?}"))
    })?;
    if payment.status != PaymentStatus::Pending {
        return Err(CoreError::InvalidState(format!(
            "payment {} is {}, expected pending",
            payment.id, payment.status
        )));
    }
    let now = Utc::now();
    tx.update_payment(Payment {
        status: PaymentStatus::Paid,
        paid_at: Some(now),
        updated_at: now,
        ..payment
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentFilter, NewAppointment, NewPayment, ProviderType};
    use crate::services::test_support::*;
    use crate::services::CoreServices;
    use crate::repositories::LocalDatabase;

    fn book(services: &CoreServices<LocalDatabase>) -> Appointment {
        services
            .appointments
            .create(
                &patient(),
                NewAppointment {
                    patient_id: PATIENT,
                    provider_type: ProviderType::Doctor,
                    doctor_id: Some(DOCTOR_ID),
                    home_care_provider_id: None,
                    service_type_id: None,
                    date: date(),
                    start_time: time(9, 0),
                    end_time: time(9, 30),
                },
            )
            .expect("booking should succeed")
    }

    fn start_for(
        services: &CoreServices<LocalDatabase>,
        appointment_id: Option<i64>,
    ) -> Consultation {
        services
            .consultations
            .start(
                &doctor(),
                NewConsultation {
                    patient_id: PATIENT,
                    doctor_id: DOCTOR_ID,
                    appointment_id,
                    consultation_type: "video".into(),
                    notes: None,
                    fee: Some(50.0),
                },
            )
            .expect("start should succeed")
    }

    #[test]
    fn booking_to_refund_scenario() {
        let services = services();
        let appointment = book(&services);
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);

        let consultation = start_for(&services, Some(appointment.id));
        assert_eq!(consultation.status, ConsultationStatus::InProgress);

        let completed = services
            .consultations
            .complete(&doctor(), consultation.id, CompleteConsultation::default())
            .expect("complete should succeed");
        assert_eq!(completed.status, ConsultationStatus::Completed);
        assert!(completed.completed_at.is_some_and(|at| at >= completed.started_at));

        let booking = services.appointments.get(&patient(), appointment.id).unwrap();
        assert_eq!(booking.status, AppointmentStatus::Completed);

        let payment = services
            .payments
            .create(
                &patient(),
                NewPayment {
                    amount: 50.0,
                    consultation_id: Some(consultation.id),
                    home_care_visit_id: None,
                },
            )
            .expect("payment should succeed");
        assert_eq!(payment.status, PaymentStatus::Pending);

        let err = services.payments.refund(&admin(), payment.id).unwrap_err();
        assert!(matches!(err, CoreError::IneligibleRefund { .. }));
    }

    #[test]
    fn complete_succeeds_exactly_once() {
        let services = services();
        let consultation = start_for(&services, None);
        services
            .consultations
            .complete(&doctor(), consultation.id, CompleteConsultation::default())
            .expect("first completion should succeed");
        let err = services
            .consultations
            .complete(&doctor(), consultation.id, CompleteConsultation::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn failed_settlement_leaves_everything_unchanged() {
        let services = services();
        let appointment = book(&services);
        let consultation = start_for(&services, Some(appointment.id));

        // no payment raised yet, so settlement fails
        let err = services
            .consultations
            .complete(
                &doctor(),
                consultation.id,
                CompleteConsultation {
                    settle_payment: true,
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        let after = services.consultations.get(&doctor(), consultation.id).unwrap();
        assert_eq!(after, consultation);
        let booking = services.appointments.get(&patient(), appointment.id).unwrap();
        assert_eq!(booking.status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn settlement_marks_payment_paid() {
        let services = services();
        let consultation = start_for(&services, None);
        let payment = services
            .payments
            .create(
                &doctor(),
                NewPayment {
                    amount: 80.0,
                    consultation_id: Some(consultation.id),
                    home_care_visit_id: None,
                },
            )
            .unwrap();

        services
            .consultations
            .complete(
                &doctor(),
                consultation.id,
                CompleteConsultation {
                    settle_payment: true,
                    ..Default::default()
                },
            )
            .expect("complete should succeed");

        let paid = services.payments.get(&patient(), payment.id).unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert!(paid.paid_at.is_some());
    }

    #[test]
    fn one_consultation_per_booking() {
        let services = services();
        let appointment = book(&services);
        start_for(&services, Some(appointment.id));

        let err = services
            .consultations
            .start(
                &doctor(),
                NewConsultation {
                    patient_id: PATIENT,
                    doctor_id: DOCTOR_ID,
                    appointment_id: Some(appointment.id),
                    consultation_type: "video".into(),
                    notes: None,
                    fee: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn start_validates_input_and_booking_parties() {
        let services = services();
        let err = services
            .consultations
            .start(
                &doctor(),
                NewConsultation {
                    patient_id: PATIENT,
                    doctor_id: DOCTOR_ID,
                    appointment_id: None,
                    consultation_type: "  ".into(),
                    notes: None,
                    fee: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let appointment = book(&services);
        let err = services
            .consultations
            .start(
                &doctor(),
                NewConsultation {
                    patient_id: OTHER_PATIENT,
                    doctor_id: DOCTOR_ID,
                    appointment_id: Some(appointment.id),
                    consultation_type: "video".into(),
                    notes: None,
                    fee: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn patients_cannot_complete() {
        let services = services();
        let consultation = start_for(&services, None);
        let err = services
            .consultations
            .complete(&patient(), consultation.id, CompleteConsultation::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[test]
    fn in_progress_consultation_blocks_cancellation() {
        let services = services();
        let appointment = book(&services);
        start_for(&services, Some(appointment.id));

        let err = services
            .appointments
            .cancel(&patient(), appointment.id, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        let err = services.appointments.delete(&admin(), appointment.id).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        let listed = services
            .appointments
            .list(&admin(), AppointmentFilter::default(), Page::all())
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn list_is_scoped_to_participants() {
        let services = services();
        start_for(&services, None);
        start_for(&services, None);

        let mine = services
            .consultations
            .list(&patient(), ConsultationFilter::default(), Page::all())
            .unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine[0].id > mine[1].id || mine[0].started_at > mine[1].started_at);

        let none = services
            .consultations
            .list(&other_patient(), ConsultationFilter::default(), Page::all())
            .unwrap();
        assert!(none.is_empty());
    }
}

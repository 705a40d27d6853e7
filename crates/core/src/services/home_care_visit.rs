//! Home-care visit lifecycle.
//!
//! `scheduled` then `in_progress` then `completed`, with `cancelled` reachable from
//! either of the first two. Completing a visit completes its booking in the same
//! transaction and can settle its pending payment. Cancelling a visit cancels its
//! booking while that is still scheduled, which frees the slot.

use carebook_types::NonEmptyText;
use chrono::Utc;

use super::consultation::{complete_appointment, settle_payment};
use super::notification::record;
use super::{check_version, ensure_bookable, found, ServiceContext};
use crate::auth::{Action, Actor, Parties, Role};
use crate::constants::{APPOINTMENT, HOME_CARE_VISIT};
use crate::models::home_care_visit::validate_location;
use crate::models::{
    require_id, Appointment, AppointmentStatus, CompleteVisit, EncounterRef, HomeCareVisit,
    HomeCareVisitUpdate, NewHomeCareVisit, NotificationKind, ProviderRef, VisitFilter,
    VisitStatus,
};
use crate::repositories::{Database, Page};
use crate::{CoreError, CoreResult};

#[derive(Debug)]
pub struct HomeCareVisitService<D> {
    ctx: ServiceContext<D>,
}

impl<D: Database> HomeCareVisitService<D> {
    pub fn new(ctx: ServiceContext<D>) -> Self {
        Self { ctx }
    }

    /// Schedules a visit with an active, available provider.
    ///
    /// A referenced booking must be a scheduled home-care booking between the same
    /// patient and provider that no other visit is linked to.
    pub fn schedule(&self, actor: &Actor, new: NewHomeCareVisit) -> CoreResult<HomeCareVisit> {
        require_id("patient_id", new.patient_id)?;
        require_id("provider_id", new.provider_id)?;
        let address = NonEmptyText::new(&new.address)
            .map_err(|_| CoreError::Validation("address is required".into()))?;
        validate_location(new.latitude, new.longitude, new.duration_hours)?;
        let provider = ProviderRef::HomeCareProvider(new.provider_id);

        self.ctx.authorizer.authorize(
            actor,
            Action::ScheduleVisit,
            &Parties::provider(provider).with_patient(new.patient_id),
        )?;

        let result = self.ctx.db.transaction(|tx| {
            ensure_bookable(tx, provider)?;
            if let Some(appointment_id) = new.appointment_id {
                let appointment =
                    found(tx.appointment(appointment_id)?, APPOINTMENT, appointment_id)?;
                if appointment.status != AppointmentStatus::Scheduled {
                    return Err(CoreError::InvalidState(format!(
                        "appointment {appointment_id} is {}",
                        appointment.status
                    )));
                }
                if appointment.provider != provider || appointment.patient_id != new.patient_id {
                    return Err(CoreError::Validation(format!(
                        "appointment {appointment_id} is not between patient {} and provider {}",
                        new.patient_id, new.provider_id
                    )));
                }
                if let Some(existing) = tx.visit_for_appointment(appointment_id)? {
                    return Err(CoreError::Conflict(format!(
                        "appointment {appointment_id} already has visit {}",
                        existing.id
                    )));
                }
            }

            let now = Utc::now();
            let visit = tx.insert_visit(HomeCareVisit {
                id: 0,
                patient_id: new.patient_id,
                provider_id: new.provider_id,
                appointment_id: new.appointment_id,
                visit_date: new.visit_date,
                address,
                latitude: new.latitude,
                longitude: new.longitude,
                duration_hours: new.duration_hours,
                special_requirements: new.special_requirements,
                status: VisitStatus::Scheduled,
                started_at: None,
                completed_at: None,
                version: 0,
                created_at: now,
                updated_at: now,
            })?;

            let message = format!("Home care visit {} on {}", visit.id, visit.visit_date);
            record(tx, visit.patient_id, NotificationKind::VisitScheduled, message.clone())?;
            record(tx, visit.provider_id, NotificationKind::VisitScheduled, message)?;
            Ok(visit)
        });

        match &result {
            Ok(v) => tracing::info!(
                visit_id = v.id,
                provider_id = v.provider_id,
                "visit scheduled"
            ),
            Err(e) if e.is_domain() => tracing::warn!("visit rejected: {}", e),
            Err(e) => tracing::error!("visit scheduling failed: {:?}", e),
        }
        result
    }

    pub fn get(&self, actor: &Actor, id: i64) -> CoreResult<HomeCareVisit> {
        let visit = self
            .ctx
            .db
            .transaction(|tx| found(tx.visit(id)?, HOME_CARE_VISIT, id))?;
        self.ctx
            .authorizer
            .authorize(actor, Action::ViewVisit, &Parties::of_visit(&visit))?;
        Ok(visit)
    }

    /// Edits the details of a visit that has not started yet.
    pub fn update(
        &self,
        actor: &Actor,
        id: i64,
        update: HomeCareVisitUpdate,
    ) -> CoreResult<HomeCareVisit> {
        let address = NonEmptyText::new(&update.address)
            .map_err(|_| CoreError::Validation("address is required".into()))?;
        validate_location(update.latitude, update.longitude, update.duration_hours)?;

        self.ctx.db.transaction(|tx| {
            let current = found(tx.visit(id)?, HOME_CARE_VISIT, id)?;
            self.ctx
                .authorizer
                .authorize(actor, Action::UpdateVisit, &Parties::of_visit(&current))?;
            if current.status != VisitStatus::Scheduled {
                return Err(CoreError::InvalidState(format!(
                    "home care visit {id} is {} and can no longer be changed",
                    current.status
                )));
            }
            check_version(update.expected_version, current.version, HOME_CARE_VISIT, id)?;
            tx.update_visit(HomeCareVisit {
                visit_date: update.visit_date,
                address,
                latitude: update.latitude,
                longitude: update.longitude,
                duration_hours: update.duration_hours,
                special_requirements: update.special_requirements,
                updated_at: Utc::now(),
                ..current
            })
        })
    }

    /// Hard delete, for administrators. Rejected while a payment or review refers to it.
    pub fn delete(&self, actor: &Actor, id: i64) -> CoreResult<()> {
        self.ctx.db.transaction(|tx| {
            let current = found(tx.visit(id)?, HOME_CARE_VISIT, id)?;
            self.ctx
                .authorizer
                .authorize(actor, Action::DeleteVisit, &Parties::of_visit(&current))?;
            let target = EncounterRef::HomeCareVisit(id);
            if tx.payment_for(target)?.is_some() || tx.review_for_encounter(target)?.is_some() {
                return Err(CoreError::Conflict(format!(
                    "home care visit {id} is referenced by a payment or review"
                )));
            }
            tx.delete_visit(id)?;
            Ok(())
        })?;
        tracing::info!(visit_id = id, "visit deleted");
        Ok(())
    }

    /// Visits newest first, restricted to the actor's own.
    pub fn list(
        &self,
        actor: &Actor,
        mut filter: VisitFilter,
        page: Page,
    ) -> CoreResult<Vec<HomeCareVisit>> {
        match actor.role {
            Role::Admin => {}
            Role::Patient => filter.patient_id = Some(actor.user_id),
            Role::HomeCareProvider => filter.provider_id = Some(actor.user_id),
            Role::Doctor => return Ok(Vec::new()),
        }
        self.ctx.db.transaction(|tx| tx.list_visits(&filter, page))
    }

    pub fn start(&self, actor: &Actor, id: i64) -> CoreResult<HomeCareVisit> {
        let result = self.ctx.db.transaction(|tx| {
            let current = found(tx.visit(id)?, HOME_CARE_VISIT, id)?;
            self.ctx
                .authorizer
                .authorize(actor, Action::StartVisit, &Parties::of_visit(&current))?;
            if !current.status.can_transition_to(VisitStatus::InProgress) {
                return Err(CoreError::InvalidState(format!(
                    "home care visit {id} is {}, expected scheduled",
                    current.status
                )));
            }
            let now = Utc::now();
            tx.update_visit(HomeCareVisit {
                status: VisitStatus::InProgress,
                started_at: Some(now),
                updated_at: now,
                ..current
            })
        });
        if let Ok(v) = &result {
            tracing::info!(visit_id = v.id, "visit started");
        }
        result
    }

    /// Completes a visit in progress, its booking, and optionally its payment, together.
    pub fn complete(
        &self,
        actor: &Actor,
        id: i64,
        request: CompleteVisit,
    ) -> CoreResult<HomeCareVisit> {
        let result = self.ctx.db.transaction(|tx| {
            let current = found(tx.visit(id)?, HOME_CARE_VISIT, id)?;
            self.ctx
                .authorizer
                .authorize(actor, Action::CompleteVisit, &Parties::of_visit(&current))?;
            if !current.status.can_transition_to(VisitStatus::Completed) {
                return Err(CoreError::InvalidState(format!(
                    "home care visit {id} is {}, expected in_progress",
                    current.status
                )));
            }
            check_version(request.expected_version, current.version, HOME_CARE_VISIT, id)?;

            let now = Utc::now();
            let completed = tx.update_visit(HomeCareVisit {
                status: VisitStatus::Completed,
                completed_at: Some(now),
                updated_at: now,
                ..current
            })?;
            if let Some(appointment_id) = completed.appointment_id {
                complete_appointment(tx, appointment_id)?;
            }
            if request.settle_payment {
                settle_payment(tx, EncounterRef::HomeCareVisit(id))?;
            }
            Ok(completed)
        });

        match &result {
            Ok(v) => tracing::info!(visit_id = v.id, "visit completed"),
            Err(e) if e.is_domain() => tracing::warn!(visit_id = id, "completion rejected: {}", e),
            Err(e) => tracing::error!("visit completion failed: {:?}", e),
        }
        result
    }

    /// Cancels a visit that has not finished.
    ///
    /// A still scheduled booking linked to the visit is cancelled with it.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the visit is already cancelled or completed.
    pub fn cancel(&self, actor: &Actor, id: i64) -> CoreResult<HomeCareVisit> {
        let result = self.ctx.db.transaction(|tx| {
            let current = found(tx.visit(id)?, HOME_CARE_VISIT, id)?;
            self.ctx
                .authorizer
                .authorize(actor, Action::CancelVisit, &Parties::of_visit(&current))?;
            if !current.status.can_transition_to(VisitStatus::Cancelled) {
                return Err(CoreError::InvalidState(format!(
                    "home care visit {id} is already {}",
                    current.status
                )));
            }
            let cancelled = tx.update_visit(HomeCareVisit {
                status: VisitStatus::Cancelled,
                updated_at: Utc::now(),
                ..current
            })?;

            if let Some(appointment_id) = cancelled.appointment_id {
                let booking =
                    found(tx.appointment(appointment_id)?, APPOINTMENT, appointment_id)?;
                if booking.status == AppointmentStatus::Scheduled {
                    tx.update_appointment(Appointment {
                        status: AppointmentStatus::Cancelled,
                        updated_at: Utc::now(),
                        ..booking
                    })?;
                    tracing::info!(
                        appointment_id,
                        visit_id = id,
                        "booking cancelled with its visit"
                    );
                }
            }

            let notify = if actor.role == Role::Patient {
                cancelled.provider_id
            } else {
                cancelled.patient_id
            };
            record(
                tx,
                notify,
                NotificationKind::VisitCancelled,
                format!("Home care visit {} was cancelled", cancelled.id),
            )?;
            Ok(cancelled)
        });
        if let Ok(v) = &result {
            tracing::info!(visit_id = v.id, "visit cancelled");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AppointmentUpdate, NewAppointment, NewHomeCareProvider, NewPayment, PaymentStatus,
        ProviderType,
    };
    use crate::repositories::LocalDatabase;
    use crate::services::test_support::*;
    use crate::services::CoreServices;

    fn new_visit(appointment_id: Option<i64>) -> NewHomeCareVisit {
        NewHomeCareVisit {
            patient_id: PATIENT,
            provider_id: PROVIDER_ID,
            appointment_id,
            visit_date: date(),
            address: "1 High Street".into(),
            latitude: 51.5,
            longitude: -0.12,
            duration_hours: 2.0,
            special_requirements: None,
        }
    }

    fn home_booking(services: &CoreServices<LocalDatabase>) -> i64 {
        services
            .appointments
            .create(
                &patient(),
                NewAppointment {
                    patient_id: PATIENT,
                    provider_type: ProviderType::HomeCareProvider,
                    doctor_id: None,
                    home_care_provider_id: Some(PROVIDER_ID),
                    service_type_id: Some(3),
                    date: date(),
                    start_time: time(14, 0),
                    end_time: time(16, 0),
                },
            )
            .expect("booking should succeed")
            .id
    }

    #[test]
    fn full_visit_lifecycle_completes_booking_and_payment() {
        let services = services();
        let appointment_id = home_booking(&services);
        let visit = services
            .visits
            .schedule(&patient(), new_visit(Some(appointment_id)))
            .expect("schedule should succeed");
        let payment = services
            .payments
            .create(
                &home_care_provider(),
                NewPayment {
                    amount: 60.0,
                    consultation_id: None,
                    home_care_visit_id: Some(visit.id),
                },
            )
            .unwrap();

        services
            .visits
            .start(&home_care_provider(), visit.id)
            .expect("start should succeed");
        let completed = services
            .visits
            .complete(
                &home_care_provider(),
                visit.id,
                CompleteVisit {
                    expected_version: None,
                    settle_payment: true,
                },
            )
            .expect("complete should succeed");
        assert_eq!(completed.status, VisitStatus::Completed);

        let booking = services.appointments.get(&patient(), appointment_id).unwrap();
        assert_eq!(booking.status, AppointmentStatus::Completed);
        let paid = services.payments.get(&patient(), payment.id).unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
    }

    #[test]
    fn cancel_fails_when_already_cancelled_or_completed() {
        let services = services();
        let visit = services.visits.schedule(&patient(), new_visit(None)).unwrap();
        services
            .visits
            .cancel(&patient(), visit.id)
            .expect("first cancel should succeed");
        let err = services.visits.cancel(&patient(), visit.id).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        let err = services
            .payments
            .create(
                &patient(),
                NewPayment {
                    amount: 10.0,
                    consultation_id: None,
                    home_care_visit_id: Some(visit.id),
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn schedule_validates_location_and_booking() {
        let services = services();
        let mut bad = new_visit(None);
        bad.latitude = 120.0;
        let err = services.visits.schedule(&patient(), bad).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let appointment_id = home_booking(&services);
        services
            .visits
            .schedule(&patient(), new_visit(Some(appointment_id)))
            .unwrap();
        let err = services
            .visits
            .schedule(&patient(), new_visit(Some(appointment_id)))
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn cancelling_a_booking_cancels_its_scheduled_visit() {
        let services = services();
        let appointment_id = home_booking(&services);
        let visit = services
            .visits
            .schedule(&patient(), new_visit(Some(appointment_id)))
            .unwrap();
        services
            .appointments
            .cancel(&patient(), appointment_id, None)
            .expect("cancel should succeed");
        let after = services.visits.get(&patient(), visit.id).unwrap();
        assert_eq!(after.status, VisitStatus::Cancelled);
    }

    #[test]
    fn cancelling_a_visit_cancels_its_scheduled_booking() {
        let services = services();
        let appointment_id = home_booking(&services);
        let visit = services
            .visits
            .schedule(&patient(), new_visit(Some(appointment_id)))
            .unwrap();

        services
            .visits
            .cancel(&home_care_provider(), visit.id)
            .expect("cancel should succeed");

        let booking = services.appointments.get(&patient(), appointment_id).unwrap();
        assert_eq!(booking.status, AppointmentStatus::Cancelled);

        // The slot is free again for a new booking and visit.
        let rebooked = home_booking(&services);
        services
            .visits
            .schedule(&patient(), new_visit(Some(rebooked)))
            .expect("visit for the new booking should succeed");
    }

    #[test]
    fn cancelling_an_in_progress_visit_also_cancels_its_booking() {
        let services = services();
        let appointment_id = home_booking(&services);
        let visit = services
            .visits
            .schedule(&patient(), new_visit(Some(appointment_id)))
            .unwrap();
        services
            .visits
            .start(&home_care_provider(), visit.id)
            .unwrap();
        services
            .visits
            .cancel(&patient(), visit.id)
            .expect("cancelling an in-progress visit should succeed");

        let booking = services.appointments.get(&patient(), appointment_id).unwrap();
        assert_eq!(booking.status, AppointmentStatus::Cancelled);
        let err = services
            .appointments
            .cancel(&patient(), appointment_id, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn provider_of_a_booking_with_a_visit_cannot_change() {
        let services = services();
        services
            .providers
            .create_home_care_provider(
                &admin(),
                NewHomeCareProvider {
                    user_id: 21,
                    name: "Second Care".into(),
                    hourly_rate: None,
                },
            )
            .unwrap();
        let appointment_id = home_booking(&services);
        let booking = services.appointments.get(&patient(), appointment_id).unwrap();
        let switch = AppointmentUpdate {
            provider_type: ProviderType::HomeCareProvider,
            doctor_id: None,
            home_care_provider_id: Some(21),
            service_type_id: booking.service_type_id,
            date: booking.date,
            start_time: booking.start_time,
            end_time: booking.end_time,
            expected_version: None,
        };

        services
            .visits
            .schedule(&patient(), new_visit(Some(appointment_id)))
            .unwrap();
        let err = services
            .appointments
            .update(&patient(), appointment_id, switch)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        let unchanged = services.appointments.get(&patient(), appointment_id).unwrap();
        assert_eq!(unchanged.provider, ProviderRef::HomeCareProvider(PROVIDER_ID));
    }

    #[test]
    fn provider_of_a_booking_without_a_visit_can_change() {
        let services = services();
        services
            .providers
            .create_home_care_provider(
                &admin(),
                NewHomeCareProvider {
                    user_id: 21,
                    name: "Second Care".into(),
                    hourly_rate: None,
                },
            )
            .unwrap();
        let appointment_id = home_booking(&services);
        let booking = services.appointments.get(&patient(), appointment_id).unwrap();

        let moved = services
            .appointments
            .update(
                &patient(),
                appointment_id,
                AppointmentUpdate {
                    provider_type: ProviderType::HomeCareProvider,
                    doctor_id: None,
                    home_care_provider_id: Some(21),
                    service_type_id: booking.service_type_id,
                    date: booking.date,
                    start_time: booking.start_time,
                    end_time: booking.end_time,
                    expected_version: None,
                },
            )
            .expect("provider change should succeed");
        assert_eq!(moved.provider, ProviderRef::HomeCareProvider(21));
    }

    #[test]
    fn only_scheduled_visits_are_editable() {
        let services = services();
        let visit = services.visits.schedule(&patient(), new_visit(None)).unwrap();
        services.visits.start(&home_care_provider(), visit.id).unwrap();
        let err = services
            .visits
            .update(
                &patient(),
                visit.id,
                HomeCareVisitUpdate {
                    visit_date: date(),
                    address: "2 Low Road".into(),
                    latitude: 0.0,
                    longitude: 0.0,
                    duration_hours: 1.0,
                    special_requirements: None,
                    expected_version: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn list_is_scoped_and_newest_first() {
        let services = services();
        services.visits.schedule(&patient(), new_visit(None)).unwrap();
        let second = services.visits.schedule(&patient(), new_visit(None)).unwrap();

        let mine = services
            .visits
            .list(&patient(), VisitFilter::default(), Page::all())
            .unwrap();
        assert_eq!(mine.first().map(|v| v.id), Some(second.id));
        assert!(services
            .visits
            .list(&other_patient(), VisitFilter::default(), Page::all())
            .unwrap()
            .is_empty());
    }
}

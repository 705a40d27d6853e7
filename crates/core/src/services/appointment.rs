//! Booking lifecycle.
//!
//! A booking starts `scheduled` and ends either `completed` (through its consultation
//! or home-care visit) or `cancelled`. Creation and rescheduling check, in one
//! transaction, that the provider is bookable, that the slot fits the doctor's
//! published availability, and that no other live booking of the provider overlaps it.

use chrono::Utc;

use super::notification::record;
use super::{
    check_version, ensure_bookable, ensure_slot_free, ensure_within_availability, found,
    ServiceContext,
};
use crate::auth::{Action, Actor, Parties, Role};
use crate::constants::APPOINTMENT;
use crate::models::appointment::validate_window;
use crate::models::{
    require_id, Appointment, AppointmentFilter, AppointmentStatus, AppointmentUpdate,
    NewAppointment, NotificationKind, ProviderRef, VisitStatus,
};
use crate::repositories::{Database, Page};
use crate::{CoreError, CoreResult};

#[derive(Debug)]
pub struct AppointmentService<D> {
    ctx: ServiceContext<D>,
}

impl<D: Database> AppointmentService<D> {
    pub fn new(ctx: ServiceContext<D>) -> Self {
        Self { ctx }
    }

    /// Books a slot for a patient.
    ///
    /// # Errors
    ///
    /// - `Validation` for a missing patient, a provider id that does not match the
    ///   provider type, or a slot that ends before it starts.
    /// - `NotFound` if the provider does not exist.
    /// - `ProviderUnavailable` if the provider is not active and available, or the slot
    ///   is outside the doctor's published availability.
    /// - `SlotConflict` if another live booking of the provider overlaps the slot.
    pub fn create(&self, actor: &Actor, new: NewAppointment) -> CoreResult<Appointment> {
        require_id("patient_id", new.patient_id)?;
        let provider =
            ProviderRef::from_parts(new.provider_type, new.doctor_id, new.home_care_provider_id)?;
        validate_window(new.start_time, new.end_time)?;

        self.ctx.authorizer.authorize(
            actor,
            Action::CreateAppointment,
            &Parties::provider(provider).with_patient(new.patient_id),
        )?;

        let appointment = self.ctx.db.transaction(|tx| {
            ensure_bookable(tx, provider)?;
            ensure_within_availability(tx, provider, new.date, new.start_time, new.end_time)?;
            ensure_slot_free(tx, provider, new.date, new.start_time, new.end_time, None)?;

            let now = Utc::now();
            let appointment = tx.insert_appointment(Appointment {
                id: 0,
                patient_id: new.patient_id,
                provider,
                service_type_id: new.service_type_id,
                date: new.date,
                start_time: new.start_time,
                end_time: new.end_time,
                status: AppointmentStatus::Scheduled,
                cancellation_reason: None,
                version: 0,
                created_at: now,
                updated_at: now,
            })?;

            record(
                tx,
                provider.id(),
                NotificationKind::AppointmentCreated,
                format!(
                    "New booking on {} at {}",
                    appointment.date, appointment.start_time
                ),
            )?;
            Ok(appointment)
        });

        match &appointment {
            Ok(a) => tracing::info!(
                appointment_id = a.id,
                patient_id = a.patient_id,
                provider = %a.provider.provider_type(),
                provider_id = a.provider.id(),
                "appointment created"
            ),
            Err(e) if e.is_domain() => tracing::warn!("appointment rejected: {}", e),
            Err(e) => tracing::error!("appointment creation failed: {:?}", e),
        }
        appointment
    }

    pub fn get(&self, actor: &Actor, id: i64) -> CoreResult<Appointment> {
        let appointment = self
            .ctx
            .db
            .transaction(|tx| found(tx.appointment(id)?, APPOINTMENT, id))?;
        self.ctx.authorizer.authorize(
            actor,
            Action::ViewAppointment,
            &Parties::of_appointment(&appointment),
        )?;
        Ok(appointment)
    }

    /// Reschedules a booking, possibly to another provider.
    ///
    /// Bookability, availability and overlap are checked again whenever the provider,
    /// date or time changes. Only `scheduled` bookings can be edited, and the provider
    /// stays fixed once a consultation or a live home-care visit is attached.
    pub fn update(
        &self,
        actor: &Actor,
        id: i64,
        update: AppointmentUpdate,
    ) -> CoreResult<Appointment> {
        let provider = ProviderRef::from_parts(
            update.provider_type,
            update.doctor_id,
            update.home_care_provider_id,
        )?;
        validate_window(update.start_time, update.end_time)?;

        let result = self.ctx.db.transaction(|tx| {
            let current = found(tx.appointment(id)?, APPOINTMENT, id)?;
            self.ctx.authorizer.authorize(
                actor,
                Action::UpdateAppointment,
                &Parties::of_appointment(&current),
            )?;
            if current.status.is_terminal() {
                return Err(CoreError::InvalidState(format!(
                    "appointment {id} is {} and can no longer be changed",
                    current.status
                )));
            }
            check_version(update.expected_version, current.version, APPOINTMENT, id)?;

            let moved = provider != current.provider
                || update.date != current.date
                || update.start_time != current.start_time
                || update.end_time != current.end_time;
            if moved {
                ensure_bookable(tx, provider)?;
                ensure_within_availability(
                    tx,
                    provider,
                    update.date,
                    update.start_time,
                    update.end_time,
                )?;
                ensure_slot_free(
                    tx,
                    provider,
                    update.date,
                    update.start_time,
                    update.end_time,
                    Some(id),
                )?;
            }
            if provider != current.provider {
                if tx.consultation_for_appointment(id)?.is_some() {
                    return Err(CoreError::InvalidState(format!(
                        "appointment {id} already has a consultation with its provider"
                    )));
                }
                let live_visit = tx
                    .visit_for_appointment(id)?
                    .filter(|v| v.status != VisitStatus::Cancelled);
                if live_visit.is_some() {
                    return Err(CoreError::InvalidState(format!(
                        "appointment {id} already has a home care visit with its provider"
                    )));
                }
            }

            let updated = tx.update_appointment(Appointment {
                provider,
                service_type_id: update.service_type_id,
                date: update.date,
                start_time: update.start_time,
                end_time: update.end_time,
                updated_at: Utc::now(),
                ..current
            })?;

            let message = format!(
                "Booking {} moved to {} at {}",
                updated.id, updated.date, updated.start_time
            );
            record(
                tx,
                updated.patient_id,
                NotificationKind::AppointmentUpdated,
                message.clone(),
            )?;
            record(
                tx,
                updated.provider.id(),
                NotificationKind::AppointmentUpdated,
                message,
            )?;
            Ok(updated)
        });

        if let Ok(a) = &result {
            tracing::info!(appointment_id = a.id, version = a.version, "appointment updated");
        }
        result
    }

    /// Moves a scheduled booking to `cancelled`.
    ///
    /// A scheduled home-care visit attached to the booking is cancelled with it. A
    /// consultation or visit already in progress blocks the cancellation.
    pub fn cancel(
        &self,
        actor: &Actor,
        id: i64,
        reason: Option<String>,
    ) -> CoreResult<Appointment> {
        let result = self.ctx.db.transaction(|tx| {
            let current = found(tx.appointment(id)?, APPOINTMENT, id)?;
            self.ctx.authorizer.authorize(
                actor,
                Action::CancelAppointment,
                &Parties::of_appointment(&current),
            )?;
            if !current.status.can_transition_to(AppointmentStatus::Cancelled) {
                return Err(CoreError::InvalidState(format!(
                    "appointment {id} is {} and cannot be cancelled",
                    current.status
                )));
            }
            if tx.consultation_for_appointment(id)?.is_some() {
                return Err(CoreError::InvalidState(format!(
                    "appointment {id} has a consultation in progress"
                )));
            }
            if let Some(visit) = tx.visit_for_appointment(id)? {
                match visit.status {
                    VisitStatus::Scheduled => {
                        tx.update_visit(crate::models::HomeCareVisit {
                            status: VisitStatus::Cancelled,
                            updated_at: Utc::now(),
                            ..visit
                        })?;
                    }
                    VisitStatus::InProgress => {
                        return Err(CoreError::InvalidState(format!(
                            "appointment {id} has a home care visit in progress"
                        )))
                    }
                    VisitStatus::Completed | VisitStatus::Cancelled => {}
                }
            }

            let cancelled = tx.update_appointment(Appointment {
                status: AppointmentStatus::Cancelled,
                cancellation_reason: reason.filter(|r| !r.trim().is_empty()),
                updated_at: Utc::now(),
                ..current
            })?;

            // tell whoever did not cancel
            let notify = if actor.role == Role::Patient {
                cancelled.provider.id()
            } else {
                cancelled.patient_id
            };
            record(
                tx,
                notify,
                NotificationKind::AppointmentCancelled,
                format!("Booking {} on {} was cancelled", cancelled.id, cancelled.date),
            )?;
            Ok(cancelled)
        });

        match &result {
            Ok(a) => tracing::info!(appointment_id = a.id, "appointment cancelled"),
            Err(e) if e.is_domain() => {
                tracing::warn!(appointment_id = id, "cancellation rejected: {}", e)
            }
            Err(e) => tracing::error!("appointment cancellation failed: {:?}", e),
        }
        result
    }

    /// Hard delete, for administrators.
    ///
    /// # Errors
    ///
    /// `Conflict` while a consultation or home-care visit still references the booking.
    pub fn delete(&self, actor: &Actor, id: i64) -> CoreResult<()> {
        self.ctx.db.transaction(|tx| {
            let current = found(tx.appointment(id)?, APPOINTMENT, id)?;
            self.ctx.authorizer.authorize(
                actor,
                Action::DeleteAppointment,
                &Parties::of_appointment(&current),
            )?;
            if tx.consultation_for_appointment(id)?.is_some()
                || tx.visit_for_appointment(id)?.is_some()
            {
                return Err(CoreError::Conflict(format!(
                    "appointment {id} is referenced by a consultation or home care visit"
                )));
            }
            tx.delete_appointment(id)?;
            Ok(())
        })?;
        tracing::info!(appointment_id = id, "appointment deleted");
        Ok(())
    }

    /// Bookings ordered by date then start time, restricted to the actor's own.
    pub fn list(
        &self,
        actor: &Actor,
        filter: AppointmentFilter,
        page: Page,
    ) -> CoreResult<Vec<Appointment>> {
        let filter = scope(actor, filter)?;
        self.ctx
            .db
            .transaction(|tx| tx.list_appointments(&filter, page))
    }

    pub fn list_by_patient(
        &self,
        actor: &Actor,
        patient_id: i64,
        filter: AppointmentFilter,
        page: Page,
    ) -> CoreResult<Vec<Appointment>> {
        self.list(
            actor,
            AppointmentFilter {
                patient_id: Some(patient_id),
                ..filter
            },
            page,
        )
    }

    pub fn list_by_provider(
        &self,
        actor: &Actor,
        provider: ProviderRef,
        filter: AppointmentFilter,
        page: Page,
    ) -> CoreResult<Vec<Appointment>> {
        self.list(
            actor,
            AppointmentFilter {
                provider: Some(provider),
                ..filter
            },
            page,
        )
    }
}

/// Narrows a filter to the rows the actor is a party to.
fn scope(actor: &Actor, mut filter: AppointmentFilter) -> CoreResult<AppointmentFilter> {
    let forbidden = || {
        CoreError::Forbidden(format!(
            "user {} may only list their own appointments",
            actor.user_id
        ))
    };
    match actor.role {
        Role::Admin => {}
        Role::Patient => {
            if filter.patient_id.is_some_and(|p| p != actor.user_id) {
                return Err(forbidden());
            }
            filter.patient_id = Some(actor.user_id);
        }
        Role::Doctor | Role::HomeCareProvider => {
            let own = if actor.role == Role::Doctor {
                ProviderRef::Doctor(actor.user_id)
            } else {
                ProviderRef::HomeCareProvider(actor.user_id)
            };
            if filter.provider.is_some_and(|p| p != own) {
                return Err(forbidden());
            }
            filter.provider = Some(own);
        }
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewAvailability, ProviderStatusUpdate, ProviderType};
    use crate::services::test_support::*;

    fn booking(start: (u32, u32), end: (u32, u32)) -> NewAppointment {
        NewAppointment {
            patient_id: PATIENT,
            provider_type: ProviderType::Doctor,
            doctor_id: Some(DOCTOR_ID),
            home_care_provider_id: None,
            service_type_id: None,
            date: date(),
            start_time: time(start.0, start.1),
            end_time: time(end.0, end.1),
        }
    }

    fn reschedule(a: &Appointment, start: (u32, u32), end: (u32, u32)) -> AppointmentUpdate {
        AppointmentUpdate {
            provider_type: ProviderType::Doctor,
            doctor_id: Some(DOCTOR_ID),
            home_care_provider_id: None,
            service_type_id: a.service_type_id,
            date: a.date,
            start_time: time(start.0, start.1),
            end_time: time(end.0, end.1),
            expected_version: Some(a.version),
        }
    }

    #[test]
    fn create_then_get_returns_scheduled_booking() {
        let services = services();
        let created = services
            .appointments
            .create(&patient(), booking((9, 0), (9, 30)))
            .expect("create should succeed");
        assert_eq!(created.status, AppointmentStatus::Scheduled);

        let first = services.appointments.get(&patient(), created.id).unwrap();
        let second = services.appointments.get(&patient(), created.id).unwrap();
        assert_eq!(first, created);
        assert_eq!(first, second);
    }

    #[test]
    fn create_notifies_the_provider() {
        let services = services();
        services
            .appointments
            .create(&patient(), booking((9, 0), (9, 30)))
            .expect("create should succeed");
        assert_eq!(services.notifications.unread_count(&doctor()).unwrap(), 1);
    }

    #[test]
    fn create_rejects_invalid_input() {
        let services = services();

        let mut bad = booking((9, 30), (9, 0));
        let err = services.appointments.create(&patient(), bad.clone()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        bad = booking((9, 0), (9, 30));
        bad.home_care_provider_id = Some(PROVIDER_ID);
        let err = services.appointments.create(&patient(), bad).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let mut unknown = booking((9, 0), (9, 30));
        unknown.doctor_id = Some(404);
        let err = services.appointments.create(&patient(), unknown).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn patients_cannot_book_for_someone_else() {
        let services = services();
        let err = services
            .appointments
            .create(&other_patient(), booking((9, 0), (9, 30)))
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[test]
    fn inactive_provider_is_unavailable() {
        let services = services();
        services
            .providers
            .update_doctor_status(
                &admin(),
                DOCTOR_ID,
                ProviderStatusUpdate {
                    is_available: Some(false),
                    ..Default::default()
                },
            )
            .expect("status update should succeed");

        let err = services
            .appointments
            .create(&patient(), booking((9, 0), (9, 30)))
            .unwrap_err();
        assert!(matches!(err, CoreError::ProviderUnavailable(_)));
    }

    #[test]
    fn overlapping_bookings_are_rejected_but_touching_ones_are_not() {
        let services = services();
        let first = services
            .appointments
            .create(&patient(), booking((9, 0), (9, 30)))
            .expect("create should succeed");

        let err = services
            .appointments
            .create(&patient(), booking((9, 15), (9, 45)))
            .unwrap_err();
        assert!(matches!(err, CoreError::SlotConflict { existing_id } if existing_id == first.id));

        services
            .appointments
            .create(&patient(), booking((9, 30), (10, 0)))
            .expect("touching slot should be accepted");
    }

    #[test]
    fn cancelled_booking_frees_the_slot() {
        let services = services();
        let first = services
            .appointments
            .create(&patient(), booking((9, 0), (9, 30)))
            .unwrap();
        services
            .appointments
            .cancel(&patient(), first.id, Some("travel".into()))
            .expect("cancel should succeed");

        services
            .appointments
            .create(&patient(), booking((9, 0), (9, 30)))
            .expect("slot should be free again");
    }

    #[test]
    fn published_availability_limits_bookings() {
        let services = services();
        services
            .availability
            .set(
                &doctor(),
                NewAvailability {
                    doctor_id: DOCTOR_ID,
                    day_of_week: 6,
                    start_time: time(9, 0),
                    end_time: time(12, 0),
                },
            )
            .expect("availability should be stored");

        services
            .appointments
            .create(&patient(), booking((11, 30), (12, 0)))
            .expect("slot inside window");
        let err = services
            .appointments
            .create(&patient(), booking((13, 0), (13, 30)))
            .unwrap_err();
        assert!(matches!(err, CoreError::ProviderUnavailable(_)));
    }

    #[test]
    fn update_rechecks_overlap_and_versions() {
        let services = services();
        let first = services
            .appointments
            .create(&patient(), booking((9, 0), (9, 30)))
            .unwrap();
        let second = services
            .appointments
            .create(&patient(), booking((10, 0), (10, 30)))
            .unwrap();

        let err = services
            .appointments
            .update(&patient(), second.id, reschedule(&second, (9, 15), (9, 45)))
            .unwrap_err();
        assert!(matches!(err, CoreError::SlotConflict { .. }));

        let moved = services
            .appointments
            .update(&patient(), first.id, reschedule(&first, (8, 30), (9, 15)))
            .expect("move within own slot should succeed");
        assert_eq!(moved.version, first.version + 1);

        let err = services
            .appointments
            .update(&patient(), first.id, reschedule(&first, (8, 0), (8, 30)))
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn terminal_bookings_cannot_be_changed() {
        let services = services();
        let a = services
            .appointments
            .create(&patient(), booking((9, 0), (9, 30)))
            .unwrap();
        let cancelled = services.appointments.cancel(&doctor(), a.id, None).unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

        let err = services
            .appointments
            .update(&patient(), a.id, reschedule(&cancelled, (10, 0), (10, 30)))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
        let err = services.appointments.cancel(&patient(), a.id, None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn delete_is_admin_only() {
        let services = services();
        let a = services
            .appointments
            .create(&patient(), booking((9, 0), (9, 30)))
            .unwrap();
        let err = services.appointments.delete(&patient(), a.id).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        services
            .appointments
            .delete(&admin(), a.id)
            .expect("admin delete should succeed");
        let err = services.appointments.get(&admin(), a.id).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn list_is_ordered_and_scoped() {
        let services = services();
        services
            .appointments
            .create(&patient(), booking((11, 0), (11, 30)))
            .unwrap();
        services
            .appointments
            .create(&patient(), booking((9, 0), (9, 30)))
            .unwrap();

        let mine = services
            .appointments
            .list(&patient(), AppointmentFilter::default(), Page::all())
            .unwrap();
        let starts: Vec<_> = mine.iter().map(|a| a.start_time).collect();
        assert_eq!(starts, vec![time(9, 0), time(11, 0)]);

        let theirs = services
            .appointments
            .list(&other_patient(), AppointmentFilter::default(), Page::all())
            .unwrap();
        assert!(theirs.is_empty());

        let err = services
            .appointments
            .list_by_patient(&other_patient(), PATIENT, AppointmentFilter::default(), Page::all())
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        let for_doctor = services
            .appointments
            .list_by_provider(
                &doctor(),
                ProviderRef::Doctor(DOCTOR_ID),
                AppointmentFilter::default(),
                Page { offset: 1, limit: 5 },
            )
            .unwrap();
        assert_eq!(for_doctor.len(), 1);
    }
}

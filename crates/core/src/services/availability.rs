//! The availability ledger: weekly windows published by doctors.
//!
//! Windows are consulted when a booking is made but never reserved by it.

use super::{found, ServiceContext};
use crate::auth::{Action, Actor, Parties};
use crate::constants::{AVAILABILITY, DOCTOR};
use crate::models::appointment::validate_window;
use crate::models::availability::validate_day;
use crate::models::{require_id, AvailabilityUpdate, DoctorAvailability, NewAvailability};
use crate::repositories::{Database, Page, Repositories};
use crate::{CoreError, CoreResult};

#[derive(Debug)]
pub struct AvailabilityService<D> {
    ctx: ServiceContext<D>,
}

impl<D: Database> AvailabilityService<D> {
    pub fn new(ctx: ServiceContext<D>) -> Self {
        Self { ctx }
    }

    /// Publishes a new weekly window.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad day or time range, `NotFound` for an unknown doctor and
    /// `Conflict` if the window overlaps another of the doctor's windows that day.
    pub fn set(&self, actor: &Actor, new: NewAvailability) -> CoreResult<DoctorAvailability> {
        require_id("doctor_id", new.doctor_id)?;
        let day = validate_day(new.day_of_week)?;
        validate_window(new.start_time, new.end_time)?;
        self.ctx.authorizer.authorize(
            actor,
            Action::ManageAvailability,
            &Parties::doctor(new.doctor_id),
        )?;

        let window = self.ctx.db.transaction(|tx| {
            found(tx.doctor(new.doctor_id)?, DOCTOR, new.doctor_id)?;
            let window = DoctorAvailability {
                id: 0,
                doctor_id: new.doctor_id,
                day_of_week: day,
                start_time: new.start_time,
                end_time: new.end_time,
            };
            ensure_no_overlap(tx, &window)?;
            tx.insert_availability(window)
        })?;
        tracing::info!(
            availability_id = window.id,
            doctor_id = window.doctor_id,
            day = window.day_of_week,
            "availability published"
        );
        Ok(window)
    }

    pub fn update(
        &self,
        actor: &Actor,
        id: i64,
        update: AvailabilityUpdate,
    ) -> CoreResult<DoctorAvailability> {
        let day = validate_day(update.day_of_week)?;
        validate_window(update.start_time, update.end_time)?;

        self.ctx.db.transaction(|tx| {
            let current = found(tx.availability(id)?, AVAILABILITY, id)?;
            self.ctx.authorizer.authorize(
                actor,
                Action::ManageAvailability,
                &Parties::doctor(current.doctor_id),
            )?;
            let window = DoctorAvailability {
                day_of_week: day,
                start_time: update.start_time,
                end_time: update.end_time,
                ..current
            };
            ensure_no_overlap(tx, &window)?;
            tx.update_availability(window)
        })
    }

    pub fn delete(&self, actor: &Actor, id: i64) -> CoreResult<()> {
        self.ctx.db.transaction(|tx| {
            let current = found(tx.availability(id)?, AVAILABILITY, id)?;
            self.ctx.authorizer.authorize(
                actor,
                Action::ManageAvailability,
                &Parties::doctor(current.doctor_id),
            )?;
            tx.delete_availability(id)?;
            Ok(())
        })
    }

    /// A doctor's windows ordered by day, then start time.
    pub fn for_doctor(&self, doctor_id: i64) -> CoreResult<Vec<DoctorAvailability>> {
        self.ctx
            .db
            .transaction(|tx| tx.availability_for_doctor(doctor_id))
    }

    pub fn list(&self, page: Page) -> CoreResult<Vec<DoctorAvailability>> {
        self.ctx.db.transaction(|tx| tx.list_availability(page))
    }
}

fn ensure_no_overlap(tx: &dyn Repositories, window: &DoctorAvailability) -> CoreResult<()> {
    let clash = tx
        .availability_for_doctor(window.doctor_id)?
        .into_iter()
        .find(|w| {
            w.id != window.id && w.overlaps(window.day_of_week, window.start_time, window.end_time)
        });
    match clash {
        Some(w) => Err(CoreError::Conflict(format!(
            "window overlaps availability {} of doctor {}",
            w.id, w.doctor_id
        ))),
        None => Ok(()),
    }
}

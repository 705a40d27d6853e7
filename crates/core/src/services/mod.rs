//! Lifecycle services.
//!
//! Each service validates its input, checks entitlement through the [`Authorizer`] and
//! runs its reads and writes inside one [`Database::transaction`]. Notifications raised
//! by a transition are written in that same transaction.

pub mod appointment;
pub mod availability;
pub mod chat;
pub mod consultation;
pub mod home_care_visit;
pub mod notification;
pub mod payment;
pub mod provider;
pub mod review;

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use crate::auth::Authorizer;
use crate::config::CoreConfig;
use crate::constants::{DOCTOR, HOME_CARE_PROVIDER};
use crate::models::ProviderRef;
use crate::repositories::{Database, Page, Repositories};
use crate::{CoreError, CoreResult};

pub use appointment::AppointmentService;
pub use availability::AvailabilityService;
pub use chat::ChatService;
pub use consultation::ConsultationService;
pub use home_care_visit::HomeCareVisitService;
pub use notification::NotificationService;
pub use payment::PaymentService;
pub use provider::ProviderService;
pub use review::ReviewService;

/// Shared handles every service needs.
#[derive(Debug)]
pub struct ServiceContext<D> {
    pub db: Arc<D>,
    pub authorizer: Arc<dyn Authorizer>,
    pub cfg: Arc<CoreConfig>,
}

impl<D> Clone for ServiceContext<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            authorizer: Arc::clone(&self.authorizer),
            cfg: Arc::clone(&self.cfg),
        }
    }
}

/// All lifecycle services over one database.
#[derive(Debug)]
pub struct CoreServices<D> {
    pub appointments: AppointmentService<D>,
    pub consultations: ConsultationService<D>,
    pub payments: PaymentService<D>,
    pub reviews: ReviewService<D>,
    pub availability: AvailabilityService<D>,
    pub providers: ProviderService<D>,
    pub visits: HomeCareVisitService<D>,
    pub notifications: NotificationService<D>,
    pub chat: ChatService<D>,
    cfg: Arc<CoreConfig>,
}

impl<D: Database> CoreServices<D> {
    pub fn new(db: Arc<D>, authorizer: Arc<dyn Authorizer>, cfg: Arc<CoreConfig>) -> Self {
        let ctx = ServiceContext {
            db,
            authorizer,
            cfg: Arc::clone(&cfg),
        };
        Self {
            appointments: AppointmentService::new(ctx.clone()),
            consultations: ConsultationService::new(ctx.clone()),
            payments: PaymentService::new(ctx.clone()),
            reviews: ReviewService::new(ctx.clone()),
            availability: AvailabilityService::new(ctx.clone()),
            providers: ProviderService::new(ctx.clone()),
            visits: HomeCareVisitService::new(ctx.clone()),
            notifications: NotificationService::new(ctx.clone()),
            chat: ChatService::new(ctx),
            cfg,
        }
    }

    /// Converts request paging values using the configured defaults and limits.
    pub fn page(&self, page: Option<usize>, page_size: Option<usize>) -> CoreResult<Page> {
        self.cfg.page(page, page_size)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }
}

// ============================================================================
// SHARED CHECKS
// ============================================================================

/// Unwraps a lookup result, reporting `NotFound` for a missing row.
pub(crate) fn found<T>(row: Option<T>, entity: &'static str, id: i64) -> CoreResult<T> {
    row.ok_or_else(|| CoreError::not_found(entity, id))
}

/// Rejects a write made against an outdated copy of a row.
pub(crate) fn check_version(
    expected: Option<u64>,
    current: u64,
    entity: &'static str,
    id: i64,
) -> CoreResult<()> {
    match expected {
        Some(expected) if expected != current => Err(CoreError::Conflict(format!(
            "{entity} {id} is at version {current}, not {expected}"
        ))),
        _ => Ok(()),
    }
}

/// The provider must exist and be active and available.
pub(crate) fn ensure_bookable(tx: &dyn Repositories, provider: ProviderRef) -> CoreResult<()> {
    let bookable = match provider {
        ProviderRef::Doctor(id) => found(tx.doctor(id)?, DOCTOR, id)?.is_bookable(),
        ProviderRef::HomeCareProvider(id) => {
            found(tx.home_care_provider(id)?, HOME_CARE_PROVIDER, id)?.is_bookable()
        }
    };
    if !bookable {
        return Err(CoreError::ProviderUnavailable(format!(
            "{} {} is not active and available",
            provider.provider_type(),
            provider.id()
        )));
    }
    Ok(())
}

/// When a doctor has published availability, the slot must fit one window.
pub(crate) fn ensure_within_availability(
    tx: &dyn Repositories,
    provider: ProviderRef,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> CoreResult<()> {
    let ProviderRef::Doctor(doctor_id) = provider else {
        return Ok(());
    };
    let windows = tx.availability_for_doctor(doctor_id)?;
    if windows.is_empty() || windows.iter().any(|w| w.covers(date, start, end)) {
        return Ok(());
    }
    Err(CoreError::ProviderUnavailable(format!(
        "doctor {doctor_id} has no availability covering {date} {start}-{end}"
    )))
}

/// No other live booking of the provider may overlap the slot.
pub(crate) fn ensure_slot_free(
    tx: &dyn Repositories,
    provider: ProviderRef,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    exclude_id: Option<i64>,
) -> CoreResult<()> {
    match tx
        .overlapping_appointments(provider, date, start, end, exclude_id)?
        .first()
    {
        Some(existing) => Err(CoreError::SlotConflict {
            existing_id: existing.id,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the service tests.

    use super::*;
    use crate::auth::{Actor, Role, RolePolicy};
    use crate::models::{NewDoctor, NewHomeCareProvider};
    use crate::repositories::LocalDatabase;

    pub const PATIENT: i64 = 1;
    pub const OTHER_PATIENT: i64 = 2;
    pub const DOCTOR_ID: i64 = 10;
    pub const PROVIDER_ID: i64 = 20;

    pub fn services() -> CoreServices<LocalDatabase> {
        let services = CoreServices::new(
            Arc::new(LocalDatabase::in_memory().expect("in-memory store should open")),
            Arc::new(RolePolicy),
            Arc::new(CoreConfig::default()),
        );
        services
            .providers
            .create_doctor(
                &admin(),
                NewDoctor {
                    user_id: DOCTOR_ID,
                    name: "Dr Ada".into(),
                    specialty: "general practice".into(),
                    consultation_fee: Some(50.0),
                },
            )
            .expect("doctor creation should succeed");
        services
            .providers
            .create_home_care_provider(
                &admin(),
                NewHomeCareProvider {
                    user_id: PROVIDER_ID,
                    name: "Grace Care".into(),
                    hourly_rate: Some(30.0),
                },
            )
            .expect("provider creation should succeed");
        services
    }

    pub fn admin() -> Actor {
        Actor::new(99, Role::Admin)
    }

    pub fn patient() -> Actor {
        Actor::new(PATIENT, Role::Patient)
    }

    pub fn other_patient() -> Actor {
        Actor::new(OTHER_PATIENT, Role::Patient)
    }

    pub fn doctor() -> Actor {
        Actor::new(DOCTOR_ID, Role::Doctor)
    }

    pub fn home_care_provider() -> Actor {
        Actor::new(PROVIDER_ID, Role::HomeCareProvider)
    }

    pub fn date() -> NaiveDate {
        // a Saturday
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    pub fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }
}

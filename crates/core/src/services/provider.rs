//! Provider directory.

use carebook_types::{Amount, NonEmptyText};
use chrono::Utc;

use super::{found, ServiceContext};
use crate::auth::{Action, Actor, Parties};
use crate::constants::{DOCTOR, HOME_CARE_PROVIDER};
use crate::models::{
    require_id, Doctor, HomeCareProvider, NewDoctor, NewHomeCareProvider, ProviderFilter,
    ProviderRef, ProviderStatus, ProviderStatusUpdate,
};
use crate::repositories::{Database, Page};
use crate::{CoreError, CoreResult};

#[derive(Debug)]
pub struct ProviderService<D> {
    ctx: ServiceContext<D>,
}

impl<D: Database> ProviderService<D> {
    pub fn new(ctx: ServiceContext<D>) -> Self {
        Self { ctx }
    }

    /// Registers a doctor under their user id. Administrators only.
    pub fn create_doctor(&self, actor: &Actor, new: NewDoctor) -> CoreResult<Doctor> {
        self.ctx
            .authorizer
            .authorize(actor, Action::ManageProviders, &Parties::default())?;
        require_id("user_id", new.user_id)?;
        let name = NonEmptyText::new(&new.name)?;
        let specialty = NonEmptyText::new(&new.specialty)?;
        let consultation_fee = new.consultation_fee.map(Amount::new).transpose()?;

        let now = Utc::now();
        let doctor = self.ctx.db.transaction(|tx| {
            tx.insert_doctor(Doctor {
                id: new.user_id,
                name,
                specialty,
                consultation_fee,
                status: ProviderStatus::Active,
                is_available: true,
                created_at: now,
                updated_at: now,
            })
        })?;
        tracing::info!(doctor_id = doctor.id, "doctor registered");
        Ok(doctor)
    }

    pub fn create_home_care_provider(
        &self,
        actor: &Actor,
        new: NewHomeCareProvider,
    ) -> CoreResult<HomeCareProvider> {
        self.ctx
            .authorizer
            .authorize(actor, Action::ManageProviders, &Parties::default())?;
        require_id("user_id", new.user_id)?;
        let name = NonEmptyText::new(&new.name)?;
        let hourly_rate = new.hourly_rate.map(Amount::new).transpose()?;

        let now = Utc::now();
        let provider = self.ctx.db.transaction(|tx| {
            tx.insert_home_care_provider(HomeCareProvider {
                id: new.user_id,
                name,
                hourly_rate,
                status: ProviderStatus::Active,
                is_available: true,
                created_at: now,
                updated_at: now,
            })
        })?;
        tracing::info!(provider_id = provider.id, "home care provider registered");
        Ok(provider)
    }

    pub fn doctor(&self, id: i64) -> CoreResult<Doctor> {
        self.ctx
            .db
            .transaction(|tx| found(tx.doctor(id)?, DOCTOR, id))
    }

    pub fn home_care_provider(&self, id: i64) -> CoreResult<HomeCareProvider> {
        self.ctx
            .db
            .transaction(|tx| found(tx.home_care_provider(id)?, HOME_CARE_PROVIDER, id))
    }

    pub fn list_doctors(&self, filter: ProviderFilter, page: Page) -> CoreResult<Vec<Doctor>> {
        self.ctx.db.transaction(|tx| tx.list_doctors(&filter, page))
    }

    pub fn list_home_care_providers(
        &self,
        filter: ProviderFilter,
        page: Page,
    ) -> CoreResult<Vec<HomeCareProvider>> {
        self.ctx
            .db
            .transaction(|tx| tx.list_home_care_providers(&filter, page))
    }

    /// Changes status or availability.
    ///
    /// Providers may toggle their own availability and move between active and
    /// inactive. Suspension, and lifting it, is reserved to administrators.
    pub fn update_doctor_status(
        &self,
        actor: &Actor,
        id: i64,
        update: ProviderStatusUpdate,
    ) -> CoreResult<Doctor> {
        let provider = ProviderRef::Doctor(id);
        self.ctx.db.transaction(|tx| {
            let current = found(tx.doctor(id)?, DOCTOR, id)?;
            self.check_status_update(actor, provider, current.status, &update)?;
            tx.update_doctor(Doctor {
                status: update.status.unwrap_or(current.status),
                is_available: update.is_available.unwrap_or(current.is_available),
                updated_at: Utc::now(),
                ..current
            })
        })
    }

    pub fn update_home_care_provider_status(
        &self,
        actor: &Actor,
        id: i64,
        update: ProviderStatusUpdate,
    ) -> CoreResult<HomeCareProvider> {
        let provider = ProviderRef::HomeCareProvider(id);
        self.ctx.db.transaction(|tx| {
            let current = found(tx.home_care_provider(id)?, HOME_CARE_PROVIDER, id)?;
            self.check_status_update(actor, provider, current.status, &update)?;
            tx.update_home_care_provider(HomeCareProvider {
                status: update.status.unwrap_or(current.status),
                is_available: update.is_available.unwrap_or(current.is_available),
                updated_at: Utc::now(),
                ..current
            })
        })
    }

    fn check_status_update(
        &self,
        actor: &Actor,
        provider: ProviderRef,
        current: ProviderStatus,
        update: &ProviderStatusUpdate,
    ) -> CoreResult<()> {
        self.ctx.authorizer.authorize(
            actor,
            Action::UpdateProviderStatus,
            &Parties::provider(provider),
        )?;
        let touches_suspension = current == ProviderStatus::Suspended
            || update.status == Some(ProviderStatus::Suspended);
        if touches_suspension && update.status.is_some() && !actor.is_admin() {
            return Err(CoreError::Forbidden(
                "only administrators may suspend or reinstate providers".into(),
            ));
        }
        tracing::info!(
            provider = %provider.provider_type(),
            provider_id = provider.id(),
            status = ?update.status,
            is_available = ?update.is_available,
            "updating provider status"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;

    #[test]
    fn only_admins_register_providers() {
        let services = services();
        let err = services
            .providers
            .create_doctor(
                &doctor(),
                NewDoctor {
                    user_id: 11,
                    name: "Dr Two".into(),
                    specialty: "cardiology".into(),
                    consultation_fee: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        let err = services
            .providers
            .create_doctor(
                &admin(),
                NewDoctor {
                    user_id: DOCTOR_ID,
                    name: "Dr Again".into(),
                    specialty: "general".into(),
                    consultation_fee: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn providers_toggle_their_own_availability() {
        let services = services();
        let updated = services
            .providers
            .update_doctor_status(
                &doctor(),
                DOCTOR_ID,
                ProviderStatusUpdate {
                    is_available: Some(false),
                    ..Default::default()
                },
            )
            .expect("self update should succeed");
        assert!(!updated.is_bookable());

        let available = services
            .providers
            .list_doctors(
                ProviderFilter {
                    is_available: Some(true),
                    ..Default::default()
                },
                Page::all(),
            )
            .unwrap();
        assert!(available.is_empty());
    }

    #[test]
    fn suspension_is_admin_only() {
        let services = services();
        let err = services
            .providers
            .update_home_care_provider_status(
                &home_care_provider(),
                PROVIDER_ID,
                ProviderStatusUpdate {
                    status: Some(ProviderStatus::Suspended),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        let suspended = services
            .providers
            .update_home_care_provider_status(
                &admin(),
                PROVIDER_ID,
                ProviderStatusUpdate {
                    status: Some(ProviderStatus::Suspended),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(suspended.status, ProviderStatus::Suspended);
        assert!(!suspended.is_bookable());
    }
}

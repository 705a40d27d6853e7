//! Authorization of lifecycle operations.
//!
//! The REST layer authenticates the caller and hands the core an [`Actor`]. Every
//! mutation (and every read of a single record) is checked by an [`Authorizer`]
//! against the [`Parties`] of the record involved, so entitlement never depends on
//! trusting ids supplied in a request body.

use serde::{Deserialize, Serialize};

use crate::models::{Appointment, Consultation, HomeCareVisit, ProviderRef};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Doctor,
    Patient,
    HomeCareProvider,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Patient => "patient",
            Self::HomeCareProvider => "home_care_provider",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doctor" => Ok(Self::Doctor),
            "patient" => Ok(Self::Patient),
            "home_care_provider" => Ok(Self::HomeCareProvider),
            "admin" => Ok(Self::Admin),
            other => Err(CoreError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateAppointment,
    ViewAppointment,
    UpdateAppointment,
    CancelAppointment,
    DeleteAppointment,
    StartConsultation,
    ViewConsultation,
    CompleteConsultation,
    CreatePayment,
    ViewPayment,
    CapturePayment,
    RefundPayment,
    CreateReview,
    UpdateReview,
    DeleteReview,
    ManageAvailability,
    ManageProviders,
    UpdateProviderStatus,
    ScheduleVisit,
    ViewVisit,
    UpdateVisit,
    StartVisit,
    CompleteVisit,
    CancelVisit,
    DeleteVisit,
    SendMessage,
    ViewMessages,
}

/// The users a record belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Parties {
    pub patient_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub home_care_provider_id: Option<i64>,
}

impl Parties {
    pub fn patient(patient_id: i64) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Self::default()
        }
    }

    pub fn doctor(doctor_id: i64) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            ..Self::default()
        }
    }

    pub fn provider(provider: ProviderRef) -> Self {
        Self {
            doctor_id: provider.doctor_id(),
            home_care_provider_id: provider.home_care_provider_id(),
            ..Self::default()
        }
    }

    pub fn with_patient(mut self, patient_id: i64) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    pub fn of_appointment(appointment: &Appointment) -> Self {
        Self::provider(appointment.provider).with_patient(appointment.patient_id)
    }

    pub fn of_consultation(consultation: &Consultation) -> Self {
        Self::doctor(consultation.doctor_id).with_patient(consultation.patient_id)
    }

    pub fn of_visit(visit: &HomeCareVisit) -> Self {
        Self::provider(ProviderRef::HomeCareProvider(visit.provider_id))
            .with_patient(visit.patient_id)
    }

    /// True when `actor` is the party matching its role.
    pub fn includes(&self, actor: &Actor) -> bool {
        let own = match actor.role {
            Role::Patient => self.patient_id,
            Role::Doctor => self.doctor_id,
            Role::HomeCareProvider => self.home_care_provider_id,
            Role::Admin => return true,
        };
        own == Some(actor.user_id)
    }
}

/// Decides whether an actor may perform an action on a record.
pub trait Authorizer: Send + Sync + std::fmt::Debug {
    /// # Errors
    ///
    /// Returns `CoreError::Forbidden` when the action is not permitted.
    fn authorize(&self, actor: &Actor, action: Action, parties: &Parties) -> CoreResult<()>;
}

/// Static role table combined with record ownership.
///
/// Admins may do anything. Every other role may perform the actions listed for it,
/// and only on records where it is the matching party.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl RolePolicy {
    fn permits(role: Role, action: Action) -> bool {
        use Action::*;
        match role {
            Role::Admin => true,
            Role::Patient => matches!(
                action,
                CreateAppointment
                    | ViewAppointment
                    | UpdateAppointment
                    | CancelAppointment
                    | ViewConsultation
                    | CreatePayment
                    | ViewPayment
                    | CreateReview
                    | UpdateReview
                    | DeleteReview
                    | ScheduleVisit
                    | ViewVisit
                    | UpdateVisit
                    | CancelVisit
                    | SendMessage
                    | ViewMessages
            ),
            Role::Doctor => matches!(
                action,
                ViewAppointment
                    | CancelAppointment
                    | StartConsultation
                    | ViewConsultation
                    | CompleteConsultation
                    | CreatePayment
                    | ViewPayment
                    | ManageAvailability
                    | UpdateProviderStatus
                    | SendMessage
                    | ViewMessages
            ),
            Role::HomeCareProvider => matches!(
                action,
                ViewAppointment
                    | CancelAppointment
                    | ScheduleVisit
                    | ViewVisit
                    | UpdateVisit
                    | StartVisit
                    | CompleteVisit
                    | CancelVisit
                    | CreatePayment
                    | ViewPayment
                    | UpdateProviderStatus
            ),
        }
    }
}

impl Authorizer for RolePolicy {
    fn authorize(&self, actor: &Actor, action: Action, parties: &Parties) -> CoreResult<()> {
        if !Self::permits(actor.role, action) {
            return Err(CoreError::Forbidden(format!(
                "{} may not perform {:?}",
                actor.role, action
            )));
        }
        if !parties.includes(actor) {
            return Err(CoreError::Forbidden(format!(
                "user {} is not a party to this record",
                actor.user_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_may_do_anything() {
        let admin = Actor::new(1, Role::Admin);
        RolePolicy
            .authorize(&admin, Action::RefundPayment, &Parties::patient(99))
            .expect("admin refund should succeed");
        RolePolicy
            .authorize(&admin, Action::DeleteAppointment, &Parties::default())
            .expect("admin delete should succeed");
    }

    #[test]
    fn patient_must_own_the_record() {
        let patient = Actor::new(7, Role::Patient);
        assert!(RolePolicy
            .authorize(&patient, Action::CreateAppointment, &Parties::patient(7))
            .is_ok());
        let err = RolePolicy
            .authorize(&patient, Action::CreateAppointment, &Parties::patient(8))
            .expect_err("foreign record");
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[test]
    fn refunds_and_deletes_are_admin_only() {
        let doctor = Actor::new(10, Role::Doctor);
        let parties = Parties::doctor(10).with_patient(1);
        assert!(RolePolicy
            .authorize(&doctor, Action::RefundPayment, &parties)
            .is_err());
        assert!(RolePolicy
            .authorize(&doctor, Action::CapturePayment, &parties)
            .is_err());
        assert!(RolePolicy
            .authorize(&doctor, Action::DeleteAppointment, &parties)
            .is_err());
        assert!(RolePolicy
            .authorize(&doctor, Action::CompleteConsultation, &parties)
            .is_ok());
    }

    #[test]
    fn patients_cannot_complete_consultations() {
        let patient = Actor::new(1, Role::Patient);
        let parties = Parties::doctor(10).with_patient(1);
        assert!(RolePolicy
            .authorize(&patient, Action::CompleteConsultation, &parties)
            .is_err());
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Doctor, Role::Patient, Role::HomeCareProvider, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("nurse".parse::<Role>().is_err());
    }
}

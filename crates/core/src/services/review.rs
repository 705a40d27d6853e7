//! Patient reviews of doctors and home-care providers.

use carebook_types::Rating;
use chrono::Utc;

use super::{found, ServiceContext};
use crate::auth::{Action, Actor, Parties};
use crate::constants::{CONSULTATION, DOCTOR, HOME_CARE_PROVIDER, HOME_CARE_VISIT, REVIEW};
use crate::models::{
    require_id, EncounterRef, NewReview, ProviderRef, RatingSummary, Review, ReviewUpdate,
    VisitStatus,
};
use crate::repositories::{Database, Page, Repositories};
use crate::{CoreError, CoreResult};

#[derive(Debug)]
pub struct ReviewService<D> {
    ctx: ServiceContext<D>,
}

impl<D: Database> ReviewService<D> {
    pub fn new(ctx: ServiceContext<D>) -> Self {
        Self { ctx }
    }

    /// Records a review.
    ///
    /// When a consultation or visit is referenced it must be completed, be the
    /// reviewer's own, be with the reviewed provider, and not have been reviewed before.
    pub fn create(&self, actor: &Actor, new: NewReview) -> CoreResult<Review> {
        require_id("patient_id", new.patient_id)?;
        let rating = Rating::new(new.rating)?;
        let provider =
            ProviderRef::from_parts(new.review_type, new.doctor_id, new.home_care_provider_id)?;
        let encounter = match (new.consultation_id, new.home_care_visit_id) {
            (None, None) => None,
            (consultation_id, visit_id) => {
                Some(EncounterRef::from_parts(consultation_id, visit_id)?)
            }
        };

        self.ctx.authorizer.authorize(
            actor,
            Action::CreateReview,
            &Parties::patient(new.patient_id),
        )?;

        let result = self.ctx.db.transaction(|tx| {
            ensure_provider_exists(tx, provider)?;
            if let Some(encounter) = encounter {
                check_encounter(tx, encounter, new.patient_id, provider)?;
                if let Some(existing) = tx.review_for_encounter(encounter)? {
                    return Err(CoreError::Conflict(format!(
                        "{encounter:?} was already reviewed in review {}",
                        existing.id
                    )));
                }
            }

            let now = Utc::now();
            tx.insert_review(Review {
                id: 0,
                patient_id: new.patient_id,
                provider,
                encounter,
                rating,
                comment: new.comment,
                created_at: now,
                updated_at: now,
            })
        });

        match &result {
            Ok(r) => tracing::info!(review_id = r.id, rating = %r.rating, "review created"),
            Err(e) if e.is_domain() => tracing::warn!("review rejected: {}", e),
            Err(e) => tracing::error!("review creation failed: {:?}", e),
        }
        result
    }

    /// Reviews are public to any authenticated user.
    pub fn get(&self, id: i64) -> CoreResult<Review> {
        self.ctx
            .db
            .transaction(|tx| found(tx.review(id)?, REVIEW, id))
    }

    pub fn update(&self, actor: &Actor, id: i64, update: ReviewUpdate) -> CoreResult<Review> {
        let rating = Rating::new(update.rating)?;
        self.ctx.db.transaction(|tx| {
            let current = found(tx.review(id)?, REVIEW, id)?;
            self.ctx.authorizer.authorize(
                actor,
                Action::UpdateReview,
                &Parties::patient(current.patient_id),
            )?;
            tx.update_review(Review {
                rating,
                comment: update.comment,
                updated_at: Utc::now(),
                ..current
            })
        })
    }

    pub fn delete(&self, actor: &Actor, id: i64) -> CoreResult<()> {
        self.ctx.db.transaction(|tx| {
            let current = found(tx.review(id)?, REVIEW, id)?;
            self.ctx.authorizer.authorize(
                actor,
                Action::DeleteReview,
                &Parties::patient(current.patient_id),
            )?;
            tx.delete_review(id)?;
            Ok(())
        })?;
        tracing::info!(review_id = id, "review deleted");
        Ok(())
    }

    /// A provider's reviews, newest first.
    pub fn list_for_provider(&self, provider: ProviderRef, page: Page) -> CoreResult<Vec<Review>> {
        self.ctx
            .db
            .transaction(|tx| tx.list_reviews_for(provider, page))
    }

    pub fn rating_summary(&self, provider: ProviderRef) -> CoreResult<RatingSummary> {
        let reviews = self
            .ctx
            .db
            .transaction(|tx| tx.list_reviews_for(provider, Page::all()))?;
        let count = reviews.len();
        let average = (count > 0).then(|| {
            reviews
                .iter()
                .map(|r| f64::from(r.rating.get()))
                .sum::<f64>()
                / count as f64
        });
        Ok(RatingSummary {
            provider,
            average,
            count,
        })
    }
}

fn ensure_provider_exists(tx: &dyn Repositories, provider: ProviderRef) -> CoreResult<()> {
    match provider {
        ProviderRef::Doctor(id) => found(tx.doctor(id)?, DOCTOR, id).map(|_| ()),
        ProviderRef::HomeCareProvider(id) => {
            found(tx.home_care_provider(id)?, HOME_CARE_PROVIDER, id).map(|_| ())
        }
    }
}

fn check_encounter(
    tx: &dyn Repositories,
    encounter: EncounterRef,
    patient_id: i64,
    provider: ProviderRef,
) -> CoreResult<()> {
    let (completed, owner, with) = match encounter {
        EncounterRef::Consultation(id) => {
            let c = found(tx.consultation(id)?, CONSULTATION, id)?;
            (c.is_completed(), c.patient_id, ProviderRef::Doctor(c.doctor_id))
        }
        EncounterRef::HomeCareVisit(id) => {
            let v = found(tx.visit(id)?, HOME_CARE_VISIT, id)?;
            (
                v.status == VisitStatus::Completed,
                v.patient_id,
                ProviderRef::HomeCareProvider(v.provider_id),
            )
        }
    };
    if owner != patient_id || with != provider {
        return Err(CoreError::Validation(format!(
            "{encounter:?} is not between patient {patient_id} and {} {}",
            provider.provider_type(),
            provider.id()
        )));
    }
    if !completed {
        return Err(CoreError::InvalidState(format!(
            "{encounter:?} is not completed"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompleteConsultation, NewConsultation, ProviderType};
    use crate::services::test_support::*;

    fn review(rating: i64) -> NewReview {
        NewReview {
            patient_id: PATIENT,
            review_type: ProviderType::Doctor,
            doctor_id: Some(DOCTOR_ID),
            home_care_provider_id: None,
            consultation_id: None,
            home_care_visit_id: None,
            rating,
            comment: Some("thorough".into()),
        }
    }

    #[test]
    fn rating_boundaries() {
        let services = services();
        for rating in [0, 6] {
            let err = services.reviews.create(&patient(), review(rating)).unwrap_err();
            assert!(matches!(err, CoreError::InvalidValue(_)));
        }
        for rating in [1, 5] {
            services
                .reviews
                .create(&patient(), review(rating))
                .expect("boundary rating should be accepted");
        }

        let summary = services
            .reviews
            .rating_summary(ProviderRef::Doctor(DOCTOR_ID))
            .unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, Some(3.0));
    }

    #[test]
    fn review_type_must_match_provider() {
        let services = services();
        let mut bad = review(4);
        bad.review_type = ProviderType::HomeCareProvider;
        let err = services.reviews.create(&patient(), bad).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn encounter_must_be_completed_and_reviewed_once() {
        let services = services();
        let consultation = services
            .consultations
            .start(
                &doctor(),
                NewConsultation {
                    patient_id: PATIENT,
                    doctor_id: DOCTOR_ID,
                    appointment_id: None,
                    consultation_type: "video".into(),
                    notes: None,
                    fee: None,
                },
            )
            .unwrap();

        let mut new = review(5);
        new.consultation_id = Some(consultation.id);
        let err = services.reviews.create(&patient(), new.clone()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        services
            .consultations
            .complete(&doctor(), consultation.id, CompleteConsultation::default())
            .unwrap();
        services
            .reviews
            .create(&patient(), new.clone())
            .expect("review of completed consultation should succeed");

        let err = services.reviews.create(&patient(), new).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn only_the_author_may_edit_or_delete() {
        let services = services();
        let created = services.reviews.create(&patient(), review(3)).unwrap();

        let err = services
            .reviews
            .update(
                &other_patient(),
                created.id,
                ReviewUpdate {
                    rating: 1,
                    comment: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        let updated = services
            .reviews
            .update(
                &patient(),
                created.id,
                ReviewUpdate {
                    rating: 4,
                    comment: None,
                },
            )
            .expect("author update should succeed");
        assert_eq!(updated.rating.get(), 4);

        services
            .reviews
            .delete(&admin(), created.id)
            .expect("admin delete should succeed");
        assert!(services
            .reviews
            .list_for_provider(ProviderRef::Doctor(DOCTOR_ID), Page::all())
            .unwrap()
            .is_empty());
    }
}

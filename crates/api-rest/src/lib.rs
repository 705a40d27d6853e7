//! # API REST
//!
//! REST API implementation for Carebook.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (bearer authentication, JSON errors, CORS)
//!
//! Uses `api-shared` for DTOs and token handling, and `carebook-core` for everything else.

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use api_shared::dto;
use handlers::{
    appointments, availability, consultations, health, inbox, payments, providers, reviews,
    visits,
};

pub use error::ApiError;
pub use state::{AppState, RestConfig};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        appointments::create_appointment,
        appointments::list_appointments,
        appointments::get_appointment,
        appointments::update_appointment,
        appointments::cancel_appointment,
        appointments::delete_appointment,
        appointments::patient_appointments,
        appointments::provider_appointments,
        consultations::start_consultation,
        consultations::list_consultations,
        consultations::get_consultation,
        consultations::complete_consultation,
        payments::create_payment,
        payments::get_payment,
        payments::update_payment_status,
        payments::capture_payment,
        payments::refund_payment,
        payments::consultation_payment,
        payments::visit_payment,
        reviews::create_review,
        reviews::get_review,
        reviews::update_review,
        reviews::delete_review,
        reviews::doctor_reviews,
        reviews::home_care_provider_reviews,
        reviews::doctor_rating,
        providers::create_doctor,
        providers::list_doctors,
        providers::get_doctor,
        providers::update_doctor,
        providers::create_home_care_provider,
        providers::list_home_care_providers,
        providers::get_home_care_provider,
        providers::update_home_care_provider,
        availability::set_availability,
        availability::list_availability,
        availability::doctor_availability,
        availability::update_availability,
        availability::delete_availability,
        visits::schedule_visit,
        visits::list_visits,
        visits::get_visit,
        visits::update_visit,
        visits::delete_visit,
        visits::start_visit,
        visits::complete_visit,
        visits::cancel_visit,
        inbox::list_notifications,
        inbox::unread_notifications,
        inbox::read_notification,
        inbox::send_message,
        inbox::list_messages,
        inbox::read_message,
        inbox::unread_messages,
    ),
    components(schemas(
        api_shared::HealthRes,
        dto::ErrorRes,
        dto::CountRes,
        dto::CreateAppointmentReq,
        dto::UpdateAppointmentReq,
        dto::CancelAppointmentReq,
        dto::AppointmentRes,
        dto::StartConsultationReq,
        dto::CompleteConsultationReq,
        dto::ConsultationRes,
        dto::CreatePaymentReq,
        dto::UpdatePaymentStatusReq,
        dto::PaymentRes,
        dto::CreateReviewReq,
        dto::UpdateReviewReq,
        dto::ReviewRes,
        dto::RatingRes,
        dto::CreateDoctorReq,
        dto::CreateHomeCareProviderReq,
        dto::UpdateProviderStatusReq,
        dto::DoctorRes,
        dto::HomeCareProviderRes,
        dto::SetAvailabilityReq,
        dto::UpdateAvailabilityReq,
        dto::AvailabilityRes,
        dto::ScheduleVisitReq,
        dto::UpdateVisitReq,
        dto::CompleteVisitReq,
        dto::VisitRes,
        dto::NotificationRes,
        dto::SendMessageReq,
        dto::MessageRes,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Builds the full application router.
///
/// `/health`, the Swagger UI and the OpenAPI document are public; every `/api` route
/// requires a bearer token.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/appointments",
            post(appointments::create_appointment).get(appointments::list_appointments),
        )
        .route(
            "/appointments/:id",
            get(appointments::get_appointment)
                .put(appointments::update_appointment)
                .delete(appointments::delete_appointment),
        )
        .route("/appointments/:id/cancel", post(appointments::cancel_appointment))
        .route("/patients/:id/appointments", get(appointments::patient_appointments))
        .route(
            "/providers/:provider_type/:id/appointments",
            get(appointments::provider_appointments),
        )
        .route(
            "/consultations",
            post(consultations::start_consultation).get(consultations::list_consultations),
        )
        .route("/consultations/:id", get(consultations::get_consultation))
        .route(
            "/consultations/:id/complete",
            post(consultations::complete_consultation),
        )
        .route(
            "/consultations/:id/messages",
            post(inbox::send_message).get(inbox::list_messages),
        )
        .route("/consultations/:id/payment", get(payments::consultation_payment))
        .route("/payments", post(payments::create_payment))
        .route("/payments/:id", get(payments::get_payment))
        .route("/payments/:id/status", put(payments::update_payment_status))
        .route("/payments/:id/capture", post(payments::capture_payment))
        .route("/payments/:id/refund", post(payments::refund_payment))
        .route("/reviews", post(reviews::create_review))
        .route(
            "/reviews/:id",
            get(reviews::get_review)
                .put(reviews::update_review)
                .delete(reviews::delete_review),
        )
        .route(
            "/doctors",
            post(providers::create_doctor).get(providers::list_doctors),
        )
        .route(
            "/doctors/:id",
            get(providers::get_doctor).put(providers::update_doctor),
        )
        .route("/doctors/:id/reviews", get(reviews::doctor_reviews))
        .route("/doctors/:id/rating", get(reviews::doctor_rating))
        .route("/doctors/:id/availability", get(availability::doctor_availability))
        .route(
            "/home-care-providers",
            post(providers::create_home_care_provider).get(providers::list_home_care_providers),
        )
        .route(
            "/home-care-providers/:id",
            get(providers::get_home_care_provider).put(providers::update_home_care_provider),
        )
        .route(
            "/home-care-providers/:id/reviews",
            get(reviews::home_care_provider_reviews),
        )
        .route(
            "/availability",
            post(availability::set_availability).get(availability::list_availability),
        )
        .route(
            "/availability/:id",
            put(availability::update_availability).delete(availability::delete_availability),
        )
        .route(
            "/home-care-visits",
            post(visits::schedule_visit).get(visits::list_visits),
        )
        .route(
            "/home-care-visits/:id",
            get(visits::get_visit)
                .put(visits::update_visit)
                .delete(visits::delete_visit),
        )
        .route("/home-care-visits/:id/start", post(visits::start_visit))
        .route("/home-care-visits/:id/complete", post(visits::complete_visit))
        .route("/home-care-visits/:id/cancel", post(visits::cancel_visit))
        .route("/home-care-visits/:id/payment", get(payments::visit_payment))
        .route("/notifications", get(inbox::list_notifications))
        .route("/notifications/unread-count", get(inbox::unread_notifications))
        .route("/notifications/:id/read", post(inbox::read_notification))
        .route("/messages/unread-count", get(inbox::unread_messages))
        .route("/messages/:id/read", post(inbox::read_message));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the router until the process is stopped.
///
/// # Errors
/// Returns an error if the address cannot be bound or the server fails while running.
pub async fn serve(cfg: &RestConfig, state: AppState) -> anyhow::Result<()> {
    tracing::info!("-- Starting Carebook REST API on {}", cfg.addr);
    let listener = tokio::net::TcpListener::bind(cfg.addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

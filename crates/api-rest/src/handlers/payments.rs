use api_shared::dto::{CreatePaymentReq, PaymentRes, UpdatePaymentStatusReq};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use carebook_core::models::{EncounterRef, PaymentStatus};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/payments",
    request_body = CreatePaymentReq,
    responses(
        (status = 201, description = "Payment raised as pending", body = PaymentRes),
        (status = 400, description = "Invalid amount or target"),
        (status = 409, description = "Encounter cancelled or already billed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create_payment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(req): Json<CreatePaymentReq>,
) -> Result<(StatusCode, Json<PaymentRes>), ApiError> {
    let payment = state.services.payments.create(&actor, req.into())?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    params(("id" = i64, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment", body = PaymentRes),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_payment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<PaymentRes>, ApiError> {
    Ok(Json(state.services.payments.get(&actor, id)?.into()))
}

#[utoipa::path(
    put,
    path = "/api/payments/{id}/status",
    params(("id" = i64, Path, description = "Payment id")),
    request_body = UpdatePaymentStatusReq,
    responses(
        (status = 200, description = "Payment moved to the requested status", body = PaymentRes),
        (status = 409, description = "Transition not allowed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update_payment_status(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePaymentStatusReq>,
) -> Result<Json<PaymentRes>, ApiError> {
    let status = req.status.parse::<PaymentStatus>()?;
    let payment = state
        .services
        .payments
        .update_status(&actor, id, status, req.expected_version)?;
    Ok(Json(payment.into()))
}

#[utoipa::path(
    post,
    path = "/api/payments/{id}/capture",
    params(("id" = i64, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment marked paid", body = PaymentRes),
        (status = 409, description = "Payment is not pending")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn capture_payment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<PaymentRes>, ApiError> {
    Ok(Json(state.services.payments.capture(&actor, id)?.into()))
}

#[utoipa::path(
    post,
    path = "/api/payments/{id}/refund",
    params(("id" = i64, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment refunded", body = PaymentRes),
        (status = 409, description = "Payment was never paid")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn refund_payment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<PaymentRes>, ApiError> {
    Ok(Json(state.services.payments.refund(&actor, id)?.into()))
}

#[utoipa::path(
    get,
    path = "/api/consultations/{id}/payment",
    params(("id" = i64, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Payment of the consultation", body = PaymentRes),
        (status = 404, description = "No payment")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn consultation_payment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<PaymentRes>, ApiError> {
    let payment = state
        .services
        .payments
        .for_encounter(&actor, EncounterRef::Consultation(id))?;
    Ok(Json(payment.into()))
}

#[utoipa::path(
    get,
    path = "/api/home-care-visits/{id}/payment",
    params(("id" = i64, Path, description = "Home-care visit id")),
    responses(
        (status = 200, description = "Payment of the visit", body = PaymentRes),
        (status = 404, description = "No payment")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn visit_payment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<PaymentRes>, ApiError> {
    let payment = state
        .services
        .payments
        .for_encounter(&actor, EncounterRef::HomeCareVisit(id))?;
    Ok(Json(payment.into()))
}

use api_shared::dto::{
    AppointmentQuery, AppointmentRes, CancelAppointmentReq, CreateAppointmentReq,
    UpdateAppointmentReq,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use carebook_core::models::{ProviderRef, ProviderType};
use carebook_core::CoreError;

use super::{collect, page};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/appointments",
    request_body = CreateAppointmentReq,
    responses(
        (status = 201, description = "Appointment booked", body = AppointmentRes),
        (status = 400, description = "Invalid booking"),
        (status = 409, description = "Provider unavailable or slot taken")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(req): Json<CreateAppointmentReq>,
) -> Result<(StatusCode, Json<AppointmentRes>), ApiError> {
    let appointment = state.services.appointments.create(&actor, req.try_into()?)?;
    Ok((StatusCode::CREATED, Json(appointment.into())))
}

#[utoipa::path(
    get,
    path = "/api/appointments",
    params(AppointmentQuery),
    responses((status = 200, description = "The caller's appointments", body = [AppointmentRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Vec<AppointmentRes>>, ApiError> {
    let page = page(&state, query.page, query.page_size)?;
    let rows = state
        .services
        .appointments
        .list(&actor, query.filter()?, page)?;
    Ok(Json(collect(rows)))
}

#[utoipa::path(
    get,
    path = "/api/appointments/{id}",
    params(("id" = i64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment", body = AppointmentRes),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<AppointmentRes>, ApiError> {
    Ok(Json(state.services.appointments.get(&actor, id)?.into()))
}

#[utoipa::path(
    put,
    path = "/api/appointments/{id}",
    params(("id" = i64, Path, description = "Appointment id")),
    request_body = UpdateAppointmentReq,
    responses(
        (status = 200, description = "Appointment rescheduled", body = AppointmentRes),
        (status = 409, description = "Terminal booking, stale version or slot taken")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAppointmentReq>,
) -> Result<Json<AppointmentRes>, ApiError> {
    let appointment = state
        .services
        .appointments
        .update(&actor, id, req.try_into()?)?;
    Ok(Json(appointment.into()))
}

#[utoipa::path(
    post,
    path = "/api/appointments/{id}/cancel",
    params(("id" = i64, Path, description = "Appointment id")),
    request_body = CancelAppointmentReq,
    responses(
        (status = 200, description = "Appointment cancelled", body = AppointmentRes),
        (status = 409, description = "Already cancelled or completed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    body: Option<Json<CancelAppointmentReq>>,
) -> Result<Json<AppointmentRes>, ApiError> {
    let reason = body.and_then(|Json(req)| req.reason);
    let appointment = state.services.appointments.cancel(&actor, id, reason)?;
    Ok(Json(appointment.into()))
}

#[utoipa::path(
    delete,
    path = "/api/appointments/{id}",
    params(("id" = i64, Path, description = "Appointment id")),
    responses(
        (status = 204, description = "Appointment deleted"),
        (status = 403, description = "Administrators only"),
        (status = 409, description = "Appointment has dependents")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.appointments.delete(&actor, id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/patients/{id}/appointments",
    params(("id" = i64, Path, description = "Patient id"), AppointmentQuery),
    responses((status = 200, description = "Patient's appointments", body = [AppointmentRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn patient_appointments(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(patient_id): Path<i64>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Vec<AppointmentRes>>, ApiError> {
    let page = page(&state, query.page, query.page_size)?;
    let rows = state
        .services
        .appointments
        .list_by_patient(&actor, patient_id, query.filter()?, page)?;
    Ok(Json(collect(rows)))
}

#[utoipa::path(
    get,
    path = "/api/providers/{type}/{id}/appointments",
    params(
        ("type" = String, Path, description = "`doctor` or `home_care_provider`"),
        ("id" = i64, Path, description = "Provider id"),
        AppointmentQuery
    ),
    responses((status = 200, description = "Provider's appointments", body = [AppointmentRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn provider_appointments(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path((provider_type, id)): Path<(String, i64)>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Vec<AppointmentRes>>, ApiError> {
    let provider = match provider_type.parse::<ProviderType>()? {
        ProviderType::Doctor => ProviderRef::Doctor(id),
        ProviderType::HomeCareProvider => ProviderRef::HomeCareProvider(id),
    };
    if id <= 0 {
        return Err(CoreError::Validation("provider id is required".into()).into());
    }
    let page = page(&state, query.page, query.page_size)?;
    let rows = state
        .services
        .appointments
        .list_by_provider(&actor, provider, query.filter()?, page)?;
    Ok(Json(collect(rows)))
}

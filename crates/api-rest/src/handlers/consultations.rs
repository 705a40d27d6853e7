use api_shared::dto::{
    CompleteConsultationReq, ConsultationQuery, ConsultationRes, StartConsultationReq,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

use super::{collect, page};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/consultations",
    request_body = StartConsultationReq,
    responses(
        (status = 201, description = "Consultation started", body = ConsultationRes),
        (status = 409, description = "Booking not startable or already has a consultation")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn start_consultation(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(req): Json<StartConsultationReq>,
) -> Result<(StatusCode, Json<ConsultationRes>), ApiError> {
    let consultation = state.services.consultations.start(&actor, req.into())?;
    Ok((StatusCode::CREATED, Json(consultation.into())))
}

#[utoipa::path(
    get,
    path = "/api/consultations",
    params(ConsultationQuery),
    responses((status = 200, description = "The caller's consultations", body = [ConsultationRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_consultations(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ConsultationQuery>,
) -> Result<Json<Vec<ConsultationRes>>, ApiError> {
    let page = page(&state, query.page, query.page_size)?;
    let rows = state
        .services
        .consultations
        .list(&actor, query.filter()?, page)?;
    Ok(Json(collect(rows)))
}

#[utoipa::path(
    get,
    path = "/api/consultations/{id}",
    params(("id" = i64, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Consultation", body = ConsultationRes),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_consultation(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ConsultationRes>, ApiError> {
    Ok(Json(state.services.consultations.get(&actor, id)?.into()))
}

#[utoipa::path(
    post,
    path = "/api/consultations/{id}/complete",
    params(("id" = i64, Path, description = "Consultation id")),
    request_body = CompleteConsultationReq,
    responses(
        (status = 200, description = "Consultation completed", body = ConsultationRes),
        (status = 409, description = "Already completed or stale version")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn complete_consultation(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    body: Option<Json<CompleteConsultationReq>>,
) -> Result<Json<ConsultationRes>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let consultation = state
        .services
        .consultations
        .complete(&actor, id, req.into())?;
    Ok(Json(consultation.into()))
}

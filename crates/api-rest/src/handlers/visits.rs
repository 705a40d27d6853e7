use api_shared::dto::{CompleteVisitReq, ScheduleVisitReq, UpdateVisitReq, VisitQuery, VisitRes};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

use super::{collect, page};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/home-care-visits",
    request_body = ScheduleVisitReq,
    responses(
        (status = 201, description = "Visit scheduled", body = VisitRes),
        (status = 400, description = "Invalid location or duration"),
        (status = 409, description = "Provider unavailable or booking already linked")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn schedule_visit(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(req): Json<ScheduleVisitReq>,
) -> Result<(StatusCode, Json<VisitRes>), ApiError> {
    let visit = state.services.visits.schedule(&actor, req.into())?;
    Ok((StatusCode::CREATED, Json(visit.into())))
}

#[utoipa::path(
    get,
    path = "/api/home-care-visits",
    params(VisitQuery),
    responses((status = 200, description = "The caller's visits, newest first", body = [VisitRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_visits(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<VisitQuery>,
) -> Result<Json<Vec<VisitRes>>, ApiError> {
    let page = page(&state, query.page, query.page_size)?;
    let rows = state.services.visits.list(&actor, query.filter()?, page)?;
    Ok(Json(collect(rows)))
}

#[utoipa::path(
    get,
    path = "/api/home-care-visits/{id}",
    params(("id" = i64, Path, description = "Visit id")),
    responses(
        (status = 200, description = "Visit", body = VisitRes),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_visit(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<VisitRes>, ApiError> {
    Ok(Json(state.services.visits.get(&actor, id)?.into()))
}

#[utoipa::path(
    put,
    path = "/api/home-care-visits/{id}",
    params(("id" = i64, Path, description = "Visit id")),
    request_body = UpdateVisitReq,
    responses(
        (status = 200, description = "Visit updated", body = VisitRes),
        (status = 409, description = "Visit already started or stale version")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update_visit(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateVisitReq>,
) -> Result<Json<VisitRes>, ApiError> {
    Ok(Json(
        state.services.visits.update(&actor, id, req.into())?.into(),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/home-care-visits/{id}",
    params(("id" = i64, Path, description = "Visit id")),
    responses(
        (status = 204, description = "Visit deleted"),
        (status = 403, description = "Administrators only"),
        (status = 409, description = "Visit has a payment or review")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete_visit(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.visits.delete(&actor, id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/home-care-visits/{id}/start",
    params(("id" = i64, Path, description = "Visit id")),
    responses(
        (status = 200, description = "Visit in progress", body = VisitRes),
        (status = 409, description = "Visit is not scheduled")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn start_visit(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<VisitRes>, ApiError> {
    Ok(Json(state.services.visits.start(&actor, id)?.into()))
}

#[utoipa::path(
    post,
    path = "/api/home-care-visits/{id}/complete",
    params(("id" = i64, Path, description = "Visit id")),
    request_body = CompleteVisitReq,
    responses(
        (status = 200, description = "Visit completed", body = VisitRes),
        (status = 409, description = "Visit is not in progress")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn complete_visit(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    body: Option<Json<CompleteVisitReq>>,
) -> Result<Json<VisitRes>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    Ok(Json(
        state.services.visits.complete(&actor, id, req.into())?.into(),
    ))
}

#[utoipa::path(
    post,
    path = "/api/home-care-visits/{id}/cancel",
    params(("id" = i64, Path, description = "Visit id")),
    responses(
        (status = 200, description = "Visit cancelled", body = VisitRes),
        (status = 409, description = "Already cancelled or completed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn cancel_visit(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<VisitRes>, ApiError> {
    Ok(Json(state.services.visits.cancel(&actor, id)?.into()))
}

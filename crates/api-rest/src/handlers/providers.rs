use api_shared::dto::{
    CreateDoctorReq, CreateHomeCareProviderReq, DoctorRes, HomeCareProviderRes, ProviderQuery,
    UpdateProviderStatusReq,
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
    path = "/api/doctors",
    request_body = CreateDoctorReq,
    responses(
        (status = 201, description = "Doctor registered", body = DoctorRes),
        (status = 403, description = "Administrators only"),
        (status = 409, description = "Doctor already registered")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(req): Json<CreateDoctorReq>,
) -> Result<(StatusCode, Json<DoctorRes>), ApiError> {
    let doctor = state.services.providers.create_doctor(&actor, req.into())?;
    Ok((StatusCode::CREATED, Json(doctor.into())))
}

#[utoipa::path(
    get,
    path = "/api/doctors",
    params(ProviderQuery),
    responses((status = 200, description = "Doctors", body = [DoctorRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Query(query): Query<ProviderQuery>,
) -> Result<Json<Vec<DoctorRes>>, ApiError> {
    let page = page(&state, query.page, query.page_size)?;
    let rows = state.services.providers.list_doctors(query.filter()?, page)?;
    Ok(Json(collect(rows)))
}

#[utoipa::path(
    get,
    path = "/api/doctors/{id}",
    params(("id" = i64, Path, description = "Doctor id")),
    responses(
        (status = 200, description = "Doctor", body = DoctorRes),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DoctorRes>, ApiError> {
    Ok(Json(state.services.providers.doctor(id)?.into()))
}

#[utoipa::path(
    put,
    path = "/api/doctors/{id}",
    params(("id" = i64, Path, description = "Doctor id")),
    request_body = UpdateProviderStatusReq,
    responses(
        (status = 200, description = "Status updated", body = DoctorRes),
        (status = 403, description = "Not the doctor or an administrator")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProviderStatusReq>,
) -> Result<Json<DoctorRes>, ApiError> {
    let doctor = state
        .services
        .providers
        .update_doctor_status(&actor, id, req.try_into()?)?;
    Ok(Json(doctor.into()))
}

#[utoipa::path(
    post,
    path = "/api/home-care-providers",
    request_body = CreateHomeCareProviderReq,
    responses(
        (status = 201, description = "Home-care provider registered", body = HomeCareProviderRes),
        (status = 403, description = "Administrators only"),
        (status = 409, description = "Provider already registered")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create_home_care_provider(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(req): Json<CreateHomeCareProviderReq>,
) -> Result<(StatusCode, Json<HomeCareProviderRes>), ApiError> {
    let provider = state
        .services
        .providers
        .create_home_care_provider(&actor, req.into())?;
    Ok((StatusCode::CREATED, Json(provider.into())))
}

#[utoipa::path(
    get,
    path = "/api/home-care-providers",
    params(ProviderQuery),
    responses((status = 200, description = "Home-care providers", body = [HomeCareProviderRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_home_care_providers(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Query(query): Query<ProviderQuery>,
) -> Result<Json<Vec<HomeCareProviderRes>>, ApiError> {
    let page = page(&state, query.page, query.page_size)?;
    let rows = state
        .services
        .providers
        .list_home_care_providers(query.filter()?, page)?;
    Ok(Json(collect(rows)))
}

#[utoipa::path(
    get,
    path = "/api/home-care-providers/{id}",
    params(("id" = i64, Path, description = "Home-care provider id")),
    responses(
        (status = 200, description = "Home-care provider", body = HomeCareProviderRes),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_home_care_provider(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<HomeCareProviderRes>, ApiError> {
    Ok(Json(state.services.providers.home_care_provider(id)?.into()))
}

#[utoipa::path(
    put,
    path = "/api/home-care-providers/{id}",
    params(("id" = i64, Path, description = "Home-care provider id")),
    request_body = UpdateProviderStatusReq,
    responses(
        (status = 200, description = "Status updated", body = HomeCareProviderRes),
        (status = 403, description = "Not the provider or an administrator")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update_home_care_provider(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProviderStatusReq>,
) -> Result<Json<HomeCareProviderRes>, ApiError> {
    let provider = state
        .services
        .providers
        .update_home_care_provider_status(&actor, id, req.try_into()?)?;
    Ok(Json(provider.into()))
}

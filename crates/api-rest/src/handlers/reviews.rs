use api_shared::dto::{CreateReviewReq, PageQuery, RatingRes, ReviewRes, UpdateReviewReq};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use carebook_core::models::ProviderRef;

use super::{collect, page};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = CreateReviewReq,
    responses(
        (status = 201, description = "Review recorded", body = ReviewRes),
        (status = 400, description = "Rating out of range or mismatched provider"),
        (status = 409, description = "Encounter not completed or already reviewed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create_review(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(req): Json<CreateReviewReq>,
) -> Result<(StatusCode, Json<ReviewRes>), ApiError> {
    let review = state.services.reviews.create(&actor, req.try_into()?)?;
    Ok((StatusCode::CREATED, Json(review.into())))
}

#[utoipa::path(
    get,
    path = "/api/reviews/{id}",
    params(("id" = i64, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review", body = ReviewRes),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_review(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ReviewRes>, ApiError> {
    Ok(Json(state.services.reviews.get(id)?.into()))
}

#[utoipa::path(
    put,
    path = "/api/reviews/{id}",
    params(("id" = i64, Path, description = "Review id")),
    request_body = UpdateReviewReq,
    responses(
        (status = 200, description = "Review updated", body = ReviewRes),
        (status = 403, description = "Not the author")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update_review(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateReviewReq>,
) -> Result<Json<ReviewRes>, ApiError> {
    Ok(Json(
        state.services.reviews.update(&actor, id, req.into())?.into(),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    params(("id" = i64, Path, description = "Review id")),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 403, description = "Not the author")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete_review(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.reviews.delete(&actor, id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/doctors/{id}/reviews",
    params(("id" = i64, Path, description = "Doctor id"), PageQuery),
    responses((status = 200, description = "Doctor's reviews, newest first", body = [ReviewRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn doctor_reviews(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ReviewRes>>, ApiError> {
    let page = page(&state, query.page, query.page_size)?;
    let rows = state
        .services
        .reviews
        .list_for_provider(ProviderRef::Doctor(id), page)?;
    Ok(Json(collect(rows)))
}

#[utoipa::path(
    get,
    path = "/api/home-care-providers/{id}/reviews",
    params(("id" = i64, Path, description = "Home-care provider id"), PageQuery),
    responses((status = 200, description = "Provider's reviews, newest first", body = [ReviewRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn home_care_provider_reviews(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ReviewRes>>, ApiError> {
    let page = page(&state, query.page, query.page_size)?;
    let rows = state
        .services
        .reviews
        .list_for_provider(ProviderRef::HomeCareProvider(id), page)?;
    Ok(Json(collect(rows)))
}

#[utoipa::path(
    get,
    path = "/api/doctors/{id}/rating",
    params(("id" = i64, Path, description = "Doctor id")),
    responses((status = 200, description = "Average rating", body = RatingRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn doctor_rating(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<RatingRes>, ApiError> {
    let summary = state
        .services
        .reviews
        .rating_summary(ProviderRef::Doctor(id))?;
    Ok(Json(summary.into()))
}

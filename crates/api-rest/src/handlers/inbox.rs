//! Notifications and consultation chat.

use api_shared::dto::{CountRes, MessageRes, NotificationRes, PageQuery, SendMessageReq};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use carebook_core::models::NewChatMessage;

use super::{collect, page};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(PageQuery),
    responses(
        (
            status = 200,
            description = "The caller's notifications, newest first",
            body = [NotificationRes]
        )
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<NotificationRes>>, ApiError> {
    let page = page(&state, query.page, query.page_size)?;
    Ok(Json(collect(state.services.notifications.list(&actor, page)?)))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    responses((status = 200, description = "Unread notifications", body = CountRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn unread_notifications(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<CountRes>, ApiError> {
    let count = state.services.notifications.unread_count(&actor)?;
    Ok(Json(CountRes { count }))
}

#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    params(("id" = i64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationRes),
        (status = 403, description = "Not the owner")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn read_notification(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<NotificationRes>, ApiError> {
    Ok(Json(state.services.notifications.mark_read(&actor, id)?.into()))
}

#[utoipa::path(
    post,
    path = "/api/consultations/{id}/messages",
    params(("id" = i64, Path, description = "Consultation id")),
    request_body = SendMessageReq,
    responses(
        (status = 201, description = "Message sent", body = MessageRes),
        (status = 403, description = "Not a participant"),
        (status = 409, description = "Consultation completed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(consultation_id): Path<i64>,
    Json(req): Json<SendMessageReq>,
) -> Result<(StatusCode, Json<MessageRes>), ApiError> {
    let message = state.services.chat.send(
        &actor,
        NewChatMessage {
            consultation_id,
            message: req.message,
        },
    )?;
    Ok((StatusCode::CREATED, Json(message.into())))
}

#[utoipa::path(
    get,
    path = "/api/consultations/{id}/messages",
    params(("id" = i64, Path, description = "Consultation id"), PageQuery),
    responses((status = 200, description = "Messages, newest first", body = [MessageRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(consultation_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<MessageRes>>, ApiError> {
    let page = page(&state, query.page, query.page_size)?;
    let rows = state.services.chat.list(&actor, consultation_id, page)?;
    Ok(Json(collect(rows)))
}

#[utoipa::path(
    post,
    path = "/api/messages/{id}/read",
    params(("id" = i64, Path, description = "Message id")),
    responses(
        (status = 200, description = "Message marked read", body = MessageRes),
        (status = 403, description = "Not the recipient")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn read_message(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageRes>, ApiError> {
    Ok(Json(state.services.chat.mark_read(&actor, id)?.into()))
}

#[utoipa::path(
    get,
    path = "/api/messages/unread-count",
    responses(
        (status = 200, description = "Unread messages addressed to the caller", body = CountRes)
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn unread_messages(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<CountRes>, ApiError> {
    let count = state.services.chat.unread_count(&actor)?;
    Ok(Json(CountRes { count }))
}

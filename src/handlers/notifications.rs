// src/handlers/notifications.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    common::{db_utils::with_db_timeout, error::ApiError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::{
        notification::{Notification, ScheduledNotification, ScheduledStatus},
        pendency::PendencyNotification,
    },
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    /// Só as não lidas
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScheduledQuery {
    pub status: Option<ScheduledStatus>,
}

// GET /api/notifications
#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notificações",
    params(NotificationQuery),
    responses((status = 200, description = "Notificações do usuário", body = Vec<Notification>)),
    security(("api_jwt" = []))
)]
pub async fn list_notifications(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let notifications = with_db_timeout(
        app_state.config.db_timeout,
        app_state.notification_service.list(&user, query.unread_only),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(notifications)))
}

// PATCH /api/notifications/{id}/read
#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    tag = "Notificações",
    params(("id" = Uuid, Path, description = "ID da notificação")),
    responses(
        (status = 200, description = "Notificação marcada como lida", body = Notification),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn mark_notification_read(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let notification = with_db_timeout(
        app_state.config.db_timeout,
        app_state.notification_service.mark_read(id, &user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(notification)))
}

// GET /api/pendency-notifications
#[utoipa::path(
    get,
    path = "/api/pendency-notifications",
    tag = "Notificações",
    responses((status = 200, description = "Eventos de pendência do usuário", body = Vec<PendencyNotification>)),
    security(("api_jwt" = []))
)]
pub async fn list_pendency_notifications(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db_timeout(
        app_state.config.db_timeout,
        app_state.pendency_service.list_pendency_notifications(&user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(rows)))
}

// GET /api/scheduled-notifications
#[utoipa::path(
    get,
    path = "/api/scheduled-notifications",
    tag = "Notificações",
    params(ScheduledQuery),
    responses((status = 200, description = "Lembretes agendados do usuário", body = Vec<ScheduledNotification>)),
    security(("api_jwt" = []))
)]
pub async fn list_scheduled(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ScheduledQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db_timeout(
        app_state.config.db_timeout,
        app_state.notification_service.list_scheduled(&user, query.status),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(rows)))
}

// POST /api/scheduled-notifications/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/scheduled-notifications/{id}/cancel",
    tag = "Notificações",
    params(("id" = Uuid, Path, description = "ID do agendamento")),
    responses(
        (status = 200, description = "Agendamento cancelado", body = ScheduledNotification),
        (status = 404, description = "Não encontrado"),
        (status = 409, description = "Já enviado ou cancelado")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_scheduled(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let scheduled = with_db_timeout(
        app_state.config.db_timeout,
        app_state.notification_service.cancel_scheduled(id, &user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(scheduled)))
}

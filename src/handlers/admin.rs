// src/handlers/admin.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        db_utils::with_db_timeout,
        error::{ApiError, AppError},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{AdminOnly, RequireRole},
    },
    models::auth::{CreateAgentPayload, ProvisionPartnerPayload, UpdateUserStatusPayload, User},
};

// POST /api/admin/users
#[utoipa::path(
    post,
    path = "/api/admin/users",
    tag = "Admin",
    request_body = CreateAgentPayload,
    responses(
        (status = 201, description = "Corretor interno criado", body = User),
        (status = 403, description = "Somente admin"),
        (status = 409, description = "E-mail já cadastrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_agent(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Json(payload): Json<CreateAgentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let user = with_db_timeout(app_state.config.db_timeout, app_state.auth_service.create_agent(admin.id, &payload))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(user)))
}

// POST /api/admin/b2b-users
#[utoipa::path(
    post,
    path = "/api/admin/b2b-users",
    tag = "Admin",
    request_body = ProvisionPartnerPayload,
    responses(
        (status = 201, description = "Parceiro B2B provisionado", body = User),
        (status = 403, description = "Somente admin"),
        (status = 409, description = "E-mail já cadastrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn provision_partner(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Json(payload): Json<ProvisionPartnerPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let partner = with_db_timeout(
        app_state.config.db_timeout,
        app_state.auth_service.provision_partner(admin.id, &payload),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(partner)))
}

// GET /api/admin/b2b-users
#[utoipa::path(
    get,
    path = "/api/admin/b2b-users",
    tag = "Admin",
    responses(
        (status = 200, description = "Parceiros B2B", body = Vec<User>),
        (status = 403, description = "Somente admin")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_partners(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let partners = with_db_timeout(app_state.config.db_timeout, app_state.auth_service.list_partners())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(partners)))
}

// PATCH /api/admin/b2b-users/{id}/status
#[utoipa::path(
    patch,
    path = "/api/admin/b2b-users/{id}/status",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "ID do parceiro")),
    request_body = UpdateUserStatusPayload,
    responses(
        (status = 200, description = "Parceiro ativado/desativado", body = User),
        (status = 403, description = "Somente admin"),
        (status = 404, description = "Parceiro não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_partner_status(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let partner = with_db_timeout(
        app_state.config.db_timeout,
        app_state.auth_service.set_partner_status(id, payload.is_active),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(partner)))
}

// src/handlers/properties.rs

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
    models::property::{CreatePropertyPayload, Property, UpdatePropertyPayload},
};

// POST /api/properties
#[utoipa::path(
    post,
    path = "/api/properties",
    tag = "Imóveis",
    request_body = CreatePropertyPayload,
    responses(
        (status = 201, description = "Imóvel cadastrado na captação", body = Property),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente ou cartório não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_property(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreatePropertyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let property = with_db_timeout(
        app_state.config.db_timeout,
        app_state.property_service.create(&payload, &user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(property)))
}

// GET /api/properties
#[utoipa::path(
    get,
    path = "/api/properties",
    tag = "Imóveis",
    responses(
        (status = 200, description = "Imóveis do usuário (todos, para admin)", body = Vec<Property>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_properties(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let properties = with_db_timeout(app_state.config.db_timeout, app_state.property_service.list(&user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(properties)))
}

// GET /api/properties/{id}
#[utoipa::path(
    get,
    path = "/api/properties/{id}",
    tag = "Imóveis",
    params(("id" = Uuid, Path, description = "ID do imóvel")),
    responses(
        (status = 200, description = "Imóvel", body = Property),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_property(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let property = with_db_timeout(app_state.config.db_timeout, app_state.property_service.get(id, &user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(property)))
}

// PUT /api/properties/{id}
#[utoipa::path(
    put,
    path = "/api/properties/{id}",
    tag = "Imóveis",
    params(("id" = Uuid, Path, description = "ID do imóvel")),
    request_body = UpdatePropertyPayload,
    responses(
        (status = 200, description = "Imóvel atualizado (etapa só muda pelo avanço)", body = Property),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_property(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePropertyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let property = with_db_timeout(
        app_state.config.db_timeout,
        app_state.property_service.update(id, &payload, &user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(property)))
}

// DELETE /api/properties/{id}
#[utoipa::path(
    delete,
    path = "/api/properties/{id}",
    tag = "Imóveis",
    params(("id" = Uuid, Path, description = "ID do imóvel")),
    responses(
        (status = 204, description = "Imóvel excluído com requisitos, métricas, logs e registros"),
        (status = 403, description = "Somente admin"),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_property(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<AdminOnly>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    with_db_timeout(app_state.config.db_timeout, app_state.property_service.delete(id, &user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

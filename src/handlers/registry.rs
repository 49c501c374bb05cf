// src/handlers/registry.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
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
    models::registry::{
        Cartorio, CartorioFilter, CreateCartorioPayload, CreateRegistroPayload, Registro,
        UpdateRegistroPayload,
    },
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RegistroQuery {
    pub property_id: Option<Uuid>,
}

// =============================================================================
//  CARTÓRIOS
// =============================================================================

// POST /api/cartorios
#[utoipa::path(
    post,
    path = "/api/cartorios",
    tag = "Registro",
    request_body = CreateCartorioPayload,
    responses(
        (status = 201, description = "Cartório cadastrado", body = Cartorio),
        (status = 403, description = "Somente admin"),
        (status = 409, description = "CNS já cadastrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_cartorio(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    Json(payload): Json<CreateCartorioPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let cartorio = with_db_timeout(app_state.config.db_timeout, app_state.registry_service.create_cartorio(&payload))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(cartorio)))
}

// GET /api/cartorios
#[utoipa::path(
    get,
    path = "/api/cartorios",
    tag = "Registro",
    params(CartorioFilter),
    responses((status = 200, description = "Cartórios", body = Vec<Cartorio>)),
    security(("api_jwt" = []))
)]
pub async fn list_cartorios(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(filter): Query<CartorioFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let cartorios = with_db_timeout(app_state.config.db_timeout, app_state.registry_service.list_cartorios(&filter))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(cartorios)))
}

// GET /api/cartorios/{id}
#[utoipa::path(
    get,
    path = "/api/cartorios/{id}",
    tag = "Registro",
    params(("id" = Uuid, Path, description = "ID do cartório")),
    responses(
        (status = 200, description = "Cartório", body = Cartorio),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_cartorio(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cartorio = with_db_timeout(app_state.config.db_timeout, app_state.registry_service.get_cartorio(id))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(cartorio)))
}

// =============================================================================
//  REGISTROS
// =============================================================================

// POST /api/registros
#[utoipa::path(
    post,
    path = "/api/registros",
    tag = "Registro",
    request_body = CreateRegistroPayload,
    responses(
        (status = 201, description = "Registro aberto", body = Registro),
        (status = 404, description = "Imóvel ou cartório não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_registro(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateRegistroPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let registro = with_db_timeout(
        app_state.config.db_timeout,
        app_state.registry_service.create_registro(&payload, &user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(registro)))
}

// GET /api/registros
#[utoipa::path(
    get,
    path = "/api/registros",
    tag = "Registro",
    params(RegistroQuery),
    responses((status = 200, description = "Registros dos imóveis do usuário", body = Vec<Registro>)),
    security(("api_jwt" = []))
)]
pub async fn list_registros(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<RegistroQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let registros = with_db_timeout(
        app_state.config.db_timeout,
        app_state.registry_service.list_registros(&user, query.property_id),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(registros)))
}

// GET /api/registros/{id}
#[utoipa::path(
    get,
    path = "/api/registros/{id}",
    tag = "Registro",
    params(("id" = Uuid, Path, description = "ID do registro")),
    responses(
        (status = 200, description = "Registro", body = Registro),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_registro(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let registro = with_db_timeout(app_state.config.db_timeout, app_state.registry_service.get_registro(id, &user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(registro)))
}

// PUT /api/registros/{id}
#[utoipa::path(
    put,
    path = "/api/registros/{id}",
    tag = "Registro",
    params(("id" = Uuid, Path, description = "ID do registro")),
    request_body = UpdateRegistroPayload,
    responses(
        (status = 200, description = "Registro atualizado", body = Registro),
        (status = 404, description = "Não encontrado"),
        (status = 409, description = "Registro já encerrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_registro(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRegistroPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let registro = with_db_timeout(
        app_state.config.db_timeout,
        app_state.registry_service.update_registro(id, &payload, &user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(registro)))
}

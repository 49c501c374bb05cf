// src/handlers/pendencies.rs

use axum::{
    extract::{Path, Query, State},
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
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::{
        pendency::{
            AdvancementResponse, PendencyItem, PendencyValidationResult, RequirementUpdateResponse,
            StageAdvancementLog, StageCompletionMetric, StageQuery, StageRequirement,
            UpdateRequirementPayload,
        },
        property::AdvanceStagePayload,
    },
};

// GET /api/properties/{id}/pendencies
#[utoipa::path(
    get,
    path = "/api/properties/{id}/pendencies",
    tag = "Pendências",
    params(("id" = Uuid, Path, description = "ID do imóvel")),
    responses(
        (status = 200, description = "Pendências da etapa atual", body = PendencyValidationResult),
        (status = 404, description = "Imóvel não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_pendencies(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = with_db_timeout(app_state.config.db_timeout, app_state.pendency_service.validate(id, &user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(result)))
}

// POST /api/properties/{id}/advance-stage
#[utoipa::path(
    post,
    path = "/api/properties/{id}/advance-stage",
    tag = "Pendências",
    params(("id" = Uuid, Path, description = "ID do imóvel")),
    request_body = AdvanceStagePayload,
    responses(
        (status = 200, description = "Imóvel na nova etapa", body = AdvancementResponse),
        (status = 400, description = "Etapa inválida"),
        (status = 404, description = "Imóvel não encontrado"),
        (status = 409, description = "Pendências críticas em aberto (blockingPendencies)")
    ),
    security(("api_jwt" = []))
)]
pub async fn advance_stage(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdvanceStagePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let response = with_db_timeout(
        app_state.config.db_timeout,
        app_state.advancement_service.advance(id, payload, &user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(response)))
}

// PUT /api/properties/{id}/requirements/{req_id}
#[utoipa::path(
    put,
    path = "/api/properties/{id}/requirements/{req_id}",
    tag = "Pendências",
    params(
        ("id" = Uuid, Path, description = "ID do imóvel"),
        ("req_id" = Uuid, Path, description = "ID do requisito do imóvel")
    ),
    request_body = UpdateRequirementPayload,
    responses(
        (status = 200, description = "Requisito atualizado e métrica recalculada", body = RequirementUpdateResponse),
        (status = 404, description = "Imóvel ou requisito não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_requirement(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, req_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateRequirementPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let response = with_db_timeout(
        app_state.config.db_timeout,
        app_state.pendency_service.update_requirement(id, req_id, &payload, &user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(response)))
}

// GET /api/properties/{id}/requirements?stage=n
#[utoipa::path(
    get,
    path = "/api/properties/{id}/requirements",
    tag = "Pendências",
    params(("id" = Uuid, Path, description = "ID do imóvel"), StageQuery),
    responses(
        (status = 200, description = "Checklist do imóvel", body = Vec<PendencyItem>),
        (status = 400, description = "Etapa inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_requirements(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(query): Query<StageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let items = with_db_timeout(
        app_state.config.db_timeout,
        app_state.pendency_service.list_requirements(id, query.stage, &user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(items)))
}

// GET /api/properties/{id}/advancement-logs
#[utoipa::path(
    get,
    path = "/api/properties/{id}/advancement-logs",
    tag = "Pendências",
    params(("id" = Uuid, Path, description = "ID do imóvel")),
    responses(
        (status = 200, description = "Histórico de tentativas de avanço", body = Vec<StageAdvancementLog>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_advancement_logs(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let logs = with_db_timeout(
        app_state.config.db_timeout,
        app_state.pendency_service.list_advancement_logs(id, &user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(logs)))
}

// GET /api/properties/{id}/metrics
#[utoipa::path(
    get,
    path = "/api/properties/{id}/metrics",
    tag = "Pendências",
    params(("id" = Uuid, Path, description = "ID do imóvel")),
    responses(
        (status = 200, description = "Percentual de conclusão por etapa", body = Vec<StageCompletionMetric>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_metrics(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let metrics = with_db_timeout(app_state.config.db_timeout, app_state.pendency_service.list_metrics(id, &user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(metrics)))
}

// GET /api/stage-requirements?stage=n
#[utoipa::path(
    get,
    path = "/api/stage-requirements",
    tag = "Pendências",
    params(StageQuery),
    responses(
        (status = 200, description = "Requisitos configurados por etapa", body = Vec<StageRequirement>),
        (status = 400, description = "Etapa inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_stage_requirements(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<StageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let requirements = with_db_timeout(
        app_state.config.db_timeout,
        app_state.pendency_service.list_stage_requirements(query.stage),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(requirements)))
}

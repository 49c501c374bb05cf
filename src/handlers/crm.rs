// src/handlers/crm.rs

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
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::crm::{
        Client, ClientNote, CreateClientPayload, CreateNotePayload, NoteAuditEntry,
        UpdateClientPayload, UpdateNotePayload,
    },
};

// =============================================================================
//  CLIENTES
// =============================================================================

// POST /api/clients
#[utoipa::path(
    post,
    path = "/api/clients",
    tag = "CRM",
    request_body = CreateClientPayload,
    responses(
        (status = 201, description = "Cliente cadastrado", body = Client),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_client(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateClientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let client = with_db_timeout(app_state.config.db_timeout, app_state.crm_service.create_client(&payload, &user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(client)))
}

// GET /api/clients
#[utoipa::path(
    get,
    path = "/api/clients",
    tag = "CRM",
    responses((status = 200, description = "Clientes do usuário", body = Vec<Client>)),
    security(("api_jwt" = []))
)]
pub async fn list_clients(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let clients = with_db_timeout(app_state.config.db_timeout, app_state.crm_service.list_clients(&user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(clients)))
}

// GET /api/clients/{id}
#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente", body = Client),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_client(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let client = with_db_timeout(app_state.config.db_timeout, app_state.crm_service.get_client(id, &user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(client)))
}

// PUT /api/clients/{id}
#[utoipa::path(
    put,
    path = "/api/clients/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    request_body = UpdateClientPayload,
    responses(
        (status = 200, description = "Cliente atualizado", body = Client),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_client(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateClientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let client = with_db_timeout(
        app_state.config.db_timeout,
        app_state.crm_service.update_client(id, &payload, &user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(client)))
}

// DELETE /api/clients/{id}
#[utoipa::path(
    delete,
    path = "/api/clients/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 204, description = "Cliente excluído com suas anotações"),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_client(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    with_db_timeout(app_state.config.db_timeout, app_state.crm_service.delete_client(id, &user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  ANOTAÇÕES
// =============================================================================

// POST /api/clients/{id}/notes
#[utoipa::path(
    post,
    path = "/api/clients/{id}/notes",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    request_body = CreateNotePayload,
    responses(
        (status = 201, description = "Anotação criada (e lembrete agendado, se houver data)", body = ClientNote),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_note(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(client_id): Path<Uuid>,
    Json(payload): Json<CreateNotePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let note = with_db_timeout(
        app_state.config.db_timeout,
        app_state.crm_service.create_note(client_id, &payload, &user),
    )
    .await
    .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(note)))
}

// GET /api/clients/{id}/notes
#[utoipa::path(
    get,
    path = "/api/clients/{id}/notes",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses((status = 200, description = "Anotações do cliente", body = Vec<ClientNote>)),
    security(("api_jwt" = []))
)]
pub async fn list_notes(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(client_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let notes = with_db_timeout(app_state.config.db_timeout, app_state.crm_service.list_notes(client_id, &user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(notes)))
}

// PUT /api/notes/{id}
#[utoipa::path(
    put,
    path = "/api/notes/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID da anotação")),
    request_body = UpdateNotePayload,
    responses(
        (status = 200, description = "Anotação atualizada; cada campo alterado vira uma linha de auditoria", body = ClientNote),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_note(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateNotePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let note = with_db_timeout(app_state.config.db_timeout, app_state.crm_service.update_note(id, &payload, &user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(note)))
}

// DELETE /api/notes/{id}
#[utoipa::path(
    delete,
    path = "/api/notes/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID da anotação")),
    responses(
        (status = 204, description = "Anotação excluída e lembretes cancelados"),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_note(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    with_db_timeout(app_state.config.db_timeout, app_state.crm_service.delete_note(id, &user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/notes/{id}/audit
#[utoipa::path(
    get,
    path = "/api/notes/{id}/audit",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID da anotação")),
    responses(
        (status = 200, description = "Histórico de alterações da anotação", body = Vec<NoteAuditEntry>),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn note_audit(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = with_db_timeout(app_state.config.db_timeout, app_state.crm_service.note_audit(id, &user))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(entries)))
}

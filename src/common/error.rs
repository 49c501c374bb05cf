// src/common/error.rs

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::{
    common::i18n::I18nStore,
    middleware::i18n::Locale,
    models::pendency::PendencyItem,
};

// Erros de domínio e de infraestrutura. Os handlers convertem para ApiError
// com o idioma da requisição.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Requisição inválida: {0}")]
    BadRequest(String),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Usuário inativo")]
    UserInactive,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Usuário não encontrado")]
    UserNotFound,

    // Também usado para falhas de propriedade (dono diferente), para não vazar existência
    #[error("Recurso não encontrado: {0}")]
    ResourceNotFound(String),

    #[error("Etapa inválida: {0}")]
    InvalidStage(i32),

    #[error("Existem {} pendências críticas em aberto", .0.len())]
    PendenciesOutstanding(Vec<PendencyItem>),

    #[error("Transição inválida: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    #[error("Tempo limite do banco de dados esgotado")]
    DatabaseTimeout,

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    /// Converte erros de unicidade do Postgres; o resto vira DatabaseError.
    pub fn from_unique(e: sqlx::Error, on_unique: impl FnOnce(&str) -> AppError) -> AppError {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("desconhecida").to_string();
                return on_unique(&constraint);
            }
        }
        e.into()
    }

    pub fn to_api_error(self, locale: &Locale, store: &I18nStore) -> ApiError {
        let lang = locale.0.as_str();

        match self {
            AppError::ValidationError(errors) => {
                let mut fields: HashMap<String, Vec<String>> = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages = field_errors
                        .iter()
                        .map(|e| {
                            let code = e
                                .message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string());
                            store.translate(lang, &format!("validation.{}", code))
                        })
                        .collect();
                    fields.insert(field.to_string(), messages);
                }
                ApiError::new(StatusCode::BAD_REQUEST, store.translate(lang, "errors.validation"))
                    .with_details(json!({ "fieldErrors": fields }))
            }
            AppError::BadRequest(detail) => {
                ApiError::new(StatusCode::BAD_REQUEST, store.translate(lang, "errors.bad_request"))
                    .with_details(json!({ "detail": detail }))
            }
            AppError::EmailAlreadyExists => {
                ApiError::new(StatusCode::CONFLICT, store.translate(lang, "errors.email_exists"))
            }
            AppError::InvalidCredentials => ApiError::new(
                StatusCode::UNAUTHORIZED,
                store.translate(lang, "errors.invalid_credentials"),
            ),
            AppError::UserInactive => {
                ApiError::new(StatusCode::FORBIDDEN, store.translate(lang, "errors.user_inactive"))
            }
            AppError::InvalidToken => {
                ApiError::new(StatusCode::UNAUTHORIZED, store.translate(lang, "errors.invalid_token"))
            }
            AppError::Forbidden => {
                ApiError::new(StatusCode::FORBIDDEN, store.translate(lang, "errors.forbidden"))
            }
            AppError::UserNotFound => {
                ApiError::new(StatusCode::NOT_FOUND, store.translate(lang, "errors.user_not_found"))
            }
            AppError::ResourceNotFound(resource) => ApiError::new(
                StatusCode::NOT_FOUND,
                store.translate_with(lang, "errors.not_found", &[("resource", &resource)]),
            ),
            AppError::InvalidStage(stage) => ApiError::new(
                StatusCode::BAD_REQUEST,
                store.translate_with(lang, "errors.invalid_stage", &[("stage", &stage.to_string())]),
            ),
            AppError::PendenciesOutstanding(blocking) => ApiError::new(
                StatusCode::CONFLICT,
                store.translate(lang, "errors.pendencies_outstanding"),
            )
            .with_code("PENDENCIES_OUTSTANDING")
            .with_details(json!({ "blockingPendencies": blocking })),
            AppError::InvalidStateTransition { from, to } => ApiError::new(
                StatusCode::CONFLICT,
                store.translate_with(lang, "errors.invalid_transition", &[("from", &from), ("to", &to)]),
            ),
            AppError::UniqueConstraintViolation(constraint) => ApiError::new(
                StatusCode::CONFLICT,
                store.translate(lang, "errors.unique_violation"),
            )
            .with_details(json!({ "constraint": constraint })),
            AppError::DatabaseTimeout => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                store.translate(lang, "errors.db_timeout"),
            )
            .with_code("DB_TIMEOUT"),

            // Banco, bcrypt, JWT e anyhow viram 500. O detalhe só sai em build de debug.
            e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                let api = ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    store.translate(lang, "errors.internal"),
                );
                if cfg!(debug_assertions) {
                    api.with_details(json!({ "detail": e.to_string() }))
                } else {
                    api
                }
            }
        }
    }
}

// O que o cliente HTTP recebe
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<&'static str>,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
            details: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    // Um objeto em `details` é mesclado no corpo da resposta
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("message".into(), Value::String(self.message.clone()));
        if let Some(code) = self.code {
            body.insert("code".into(), Value::String(code.to_string()));
        }
        match &self.details {
            Some(Value::Object(extra)) => {
                for (k, v) in extra {
                    body.insert(k.clone(), v.clone());
                }
            }
            Some(other) => {
                body.insert("details".into(), other.clone());
            }
            None => {}
        }
        Value::Object(body)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(self.body());
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pendency::{RequirementCategory, RequirementPriority, RequirementStatus};
    use uuid::Uuid;

    fn pt() -> Locale {
        Locale("pt".to_string())
    }

    #[test]
    fn pendencies_outstanding_maps_to_conflict_with_blocking_list() {
        let store = I18nStore::shared();
        let item = PendencyItem {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            requirement_id: Uuid::new_v4(),
            stage: 3,
            name: "Documentação do proprietário conferida".into(),
            description: None,
            category: RequirementCategory::Document,
            priority: RequirementPriority::Critical,
            status: RequirementStatus::Pending,
            due_date: None,
            assigned_to: None,
            notes: None,
            completed_at: None,
            completed_by: None,
        };

        let api = AppError::PendenciesOutstanding(vec![item]).to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::CONFLICT);

        let body = api.body();
        assert!(body["message"].is_string());
        assert_eq!(body["code"], "PENDENCIES_OUTSTANDING");
        assert_eq!(body["blockingPendencies"].as_array().map(|a| a.len()), Some(1));
        assert_eq!(body["blockingPendencies"][0]["priority"], "CRITICAL");
    }

    #[test]
    fn timeout_is_503_with_code() {
        let store = I18nStore::shared();
        let api = AppError::DatabaseTimeout.to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api.body()["code"], "DB_TIMEOUT");
    }

    #[test]
    fn not_found_and_forbidden_statuses() {
        let store = I18nStore::shared();
        let api = AppError::ResourceNotFound("Imóvel".into()).to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert!(api.message.contains("Imóvel"));

        let api = AppError::Forbidden.to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn validation_errors_are_grouped_by_field() {
        let store = I18nStore::shared();
        let mut errors = validator::ValidationErrors::new();
        let mut err = validator::ValidationError::new("range");
        err.message = Some("invalid_stage".into());
        errors.add("targetStage", err);

        let api = AppError::ValidationError(errors).to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        let body = api.body();
        assert!(body["fieldErrors"]["targetStage"][0].is_string());
        assert_ne!(body["fieldErrors"]["targetStage"][0], "validation.invalid_stage");
    }
}

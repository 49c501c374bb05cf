// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

// Mapeia o CREATE TYPE user_role do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Agent,
    Partner,
}

// Tipo de parceiro B2B: corretor autônomo ou imobiliária
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "partner_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerKind {
    AutonomousBroker,
    Agency,
}

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[schema(example = "corretor@imobiliaria.com.br")]
    pub email: String,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    #[schema(ignore)]
    pub password_hash: String,

    #[schema(example = "Ana Souza")]
    pub full_name: String,
    pub role: UserRole,
    pub partner_kind: Option<PartnerKind>,
    #[schema(example = "CRECI-SP 123456")]
    pub creci: Option<String>,
    pub document_number: Option<String>,
    pub company_name: Option<String>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Dados para login
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserPayload {
    #[validate(email(message = "invalid_email"))]
    #[schema(example = "admin@corretora.com.br")]
    pub email: String,
    #[validate(length(min = 1, message = "required"))]
    pub password: String,
}

// Admin cria um corretor interno
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentPayload {
    #[validate(email(message = "invalid_email"))]
    pub email: String,
    #[validate(length(min = 8, message = "password_too_short"))]
    pub password: String,
    #[validate(length(min = 1, max = 200, message = "required"))]
    #[schema(example = "Carlos Lima")]
    pub full_name: String,
    pub creci: Option<String>,
}

// Provisionamento de parceiro B2B
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionPartnerPayload {
    #[validate(email(message = "invalid_email"))]
    #[schema(example = "contato@parceira.com.br")]
    pub email: String,
    #[validate(length(min = 8, message = "password_too_short"))]
    pub password: String,
    #[validate(length(min = 1, max = 200, message = "required"))]
    #[schema(example = "Imobiliária Parceira")]
    pub full_name: String,
    pub kind: PartnerKind,
    #[schema(example = "12.345.678/0001-99")]
    pub document_number: Option<String>,
    pub creci: Option<String>,
    #[validate(length(max = 200, message = "too_long"))]
    pub company_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserStatusPayload {
    pub is_active: bool,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário)
    pub email: String,
    pub role: UserRole,
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}

// O usuário da requisição, montado a partir do token
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    // Admin enxerga tudo; os demais só o que é seu
    pub fn owner_scope(&self) -> Option<Uuid> {
        if self.is_admin() { None } else { Some(self.id) }
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

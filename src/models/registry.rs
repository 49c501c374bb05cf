// src/models/registry.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

// --- Cartório (RGI) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cartorio {
    pub id: Uuid,
    #[schema(example = "1º Oficial de Registro de Imóveis de São Paulo")]
    pub name: String,
    // Código Nacional de Serventia
    #[schema(example = "11.111-1")]
    pub cns: Option<String>,
    #[schema(example = "São Paulo")]
    pub city: String,
    #[schema(example = "SP")]
    pub state: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCartorioPayload {
    #[validate(length(min = 1, max = 200, message = "required"))]
    pub name: String,
    pub cns: Option<String>,
    #[validate(length(min = 1, message = "required"))]
    pub city: String,
    #[validate(length(equal = 2, message = "invalid_uf"))]
    pub state: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CartorioFilter {
    pub city: Option<String>,
    /// UF (duas letras)
    pub state: Option<String>,
}

// --- Registro ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "registro_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistroStatus {
    EmPreparacao,
    Protocolado,
    EmExigencia,
    Registrado,
    Cancelado,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Registro {
    pub id: Uuid,
    pub property_id: Uuid,
    pub cartorio_id: Uuid,
    #[schema(example = "PRT-2025-000123")]
    pub protocol_number: Option<String>,
    // Número da matrícula após o registro
    pub registration_number: Option<String>,
    pub status: RegistroStatus,
    #[schema(value_type = Option<String>, format = Date)]
    pub protocol_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    pub expected_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    pub completed_date: Option<NaiveDate>,
    #[schema(example = "3250.75")]
    pub fees: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegistroPayload {
    pub property_id: Uuid,
    pub cartorio_id: Uuid,
    pub protocol_number: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub protocol_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    pub expected_date: Option<NaiveDate>,
    pub fees: Option<Decimal>,
    #[validate(length(max = 2000, message = "too_long"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRegistroPayload {
    pub status: Option<RegistroStatus>,
    pub protocol_number: Option<String>,
    pub registration_number: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub protocol_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    pub expected_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    pub completed_date: Option<NaiveDate>,
    pub fees: Option<Decimal>,
    #[validate(length(max = 2000, message = "too_long"))]
    pub notes: Option<String>,
}

impl RegistroStatus {
    // Registrado e cancelado encerram o processo
    pub fn is_final(self) -> bool {
        matches!(self, RegistroStatus::Registrado | RegistroStatus::Cancelado)
    }
}

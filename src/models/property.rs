// src/models/property.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

pub const FIRST_STAGE: i32 = 1;
pub const LAST_STAGE: i32 = 8;

// --- Enums ---

// As 8 etapas do pipeline. No banco é o CREATE TYPE property_status,
// e `current_stage` guarda o número correspondente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "property_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "lowercase")]
pub enum PropertyStage {
    Captacao,
    Diligence,
    Mercado,
    Proposta,
    Contrato,
    Financiamento,
    Instrumento,
    Concluido,
}

impl PropertyStage {
    pub const ALL: [PropertyStage; 8] = [
        PropertyStage::Captacao,
        PropertyStage::Diligence,
        PropertyStage::Mercado,
        PropertyStage::Proposta,
        PropertyStage::Contrato,
        PropertyStage::Financiamento,
        PropertyStage::Instrumento,
        PropertyStage::Concluido,
    ];

    pub fn number(self) -> i32 {
        match self {
            PropertyStage::Captacao => 1,
            PropertyStage::Diligence => 2,
            PropertyStage::Mercado => 3,
            PropertyStage::Proposta => 4,
            PropertyStage::Contrato => 5,
            PropertyStage::Financiamento => 6,
            PropertyStage::Instrumento => 7,
            PropertyStage::Concluido => 8,
        }
    }

    pub fn from_number(stage: i32) -> Option<Self> {
        if (FIRST_STAGE..=LAST_STAGE).contains(&stage) {
            Some(Self::ALL[(stage - 1) as usize])
        } else {
            None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PropertyStage::Captacao => "Captação",
            PropertyStage::Diligence => "Diligence",
            PropertyStage::Mercado => "Mercado",
            PropertyStage::Proposta => "Proposta",
            PropertyStage::Contrato => "Contrato",
            PropertyStage::Financiamento => "Financiamento",
            PropertyStage::Instrumento => "Instrumento",
            PropertyStage::Concluido => "Concluído",
        }
    }
}

// --- Imóvel ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub client_id: Option<Uuid>,
    pub cartorio_id: Option<Uuid>,
    #[schema(example = "Apartamento 3 dormitórios - Moema")]
    pub title: String,
    #[schema(example = "Av. Ibirapuera")]
    pub street: String,
    #[schema(example = "2000")]
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    #[schema(example = "São Paulo")]
    pub city: String,
    #[schema(example = "SP")]
    pub state: String,
    #[schema(example = "04028-001")]
    pub zip_code: Option<String>,
    #[schema(example = "850000.00")]
    pub value: Option<Decimal>,
    // Matrícula no RGI
    #[schema(example = "123.456")]
    pub registration_number: Option<String>,
    pub iptu_number: Option<String>,
    pub status: PropertyStage,
    #[schema(example = 1)]
    pub current_stage: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyPayload {
    #[validate(length(min = 1, max = 200, message = "required"))]
    pub title: String,
    #[validate(length(min = 1, message = "required"))]
    pub street: String,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    #[validate(length(min = 1, message = "required"))]
    pub city: String,
    #[validate(length(equal = 2, message = "invalid_uf"))]
    pub state: String,
    pub zip_code: Option<String>,
    pub value: Option<Decimal>,
    pub registration_number: Option<String>,
    pub iptu_number: Option<String>,
    pub client_id: Option<Uuid>,
    pub cartorio_id: Option<Uuid>,
    // Só o admin pode cadastrar imóvel em nome de outro corretor
    pub owner_id: Option<Uuid>,
}

// Não há campo de etapa aqui: etapa só muda pelo fluxo de avanço.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePropertyPayload {
    #[validate(length(min = 1, max = 200, message = "required"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "required"))]
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    #[validate(length(min = 1, message = "required"))]
    pub city: Option<String>,
    #[validate(length(equal = 2, message = "invalid_uf"))]
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub value: Option<Decimal>,
    pub registration_number: Option<String>,
    pub iptu_number: Option<String>,
    pub client_id: Option<Uuid>,
    pub cartorio_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceStagePayload {
    #[validate(range(min = 1, max = 8, message = "invalid_stage"))]
    #[schema(example = 4)]
    pub target_stage: i32,

    // "Prosseguir mesmo assim" na tela de pendências
    #[serde(default)]
    pub force: bool,

    #[validate(length(max = 1000, message = "too_long"))]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_numbers_round_trip_in_order() {
        for (i, stage) in PropertyStage::ALL.iter().enumerate() {
            assert_eq!(stage.number(), i as i32 + 1);
            assert_eq!(PropertyStage::from_number(stage.number()), Some(*stage));
        }
        assert_eq!(PropertyStage::from_number(0), None);
        assert_eq!(PropertyStage::from_number(9), None);
    }

    #[test]
    fn stage_serializes_as_pipeline_name() {
        let json = serde_json::to_string(&PropertyStage::Financiamento).unwrap();
        assert_eq!(json, "\"financiamento\"");
    }

    #[test]
    fn advance_payload_rejects_out_of_range_stage() {
        let payload: AdvanceStagePayload = serde_json::from_str(r#"{"targetStage": 9}"#).unwrap();
        assert!(payload.validate().is_err());
        assert!(!payload.force);

        let payload: AdvanceStagePayload =
            serde_json::from_str(r#"{"targetStage": 4, "force": true}"#).unwrap();
        assert!(payload.validate().is_ok());
        assert!(payload.force);
    }
}

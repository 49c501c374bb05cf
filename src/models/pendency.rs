// src/models/pendency.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::property::Property;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "requirement_category", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementCategory {
    Document,
    Approval,
    Payment,
    Inspection,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "requirement_priority", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "requirement_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "advancement_outcome", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvancementOutcome {
    Allowed,
    Overridden,
    Blocked,
}

// --- Configuração (semeada por migration) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageRequirement {
    pub id: Uuid,
    #[schema(example = 2)]
    pub stage: i32,
    #[schema(example = "Matrícula atualizada")]
    pub name: String,
    pub description: Option<String>,
    pub category: RequirementCategory,
    pub priority: RequirementPriority,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// --- Requisito do imóvel (com os dados da configuração já juntados) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendencyItem {
    pub id: Uuid,
    pub property_id: Uuid,
    pub requirement_id: Uuid,
    pub stage: i32,
    pub name: String,
    pub description: Option<String>,
    pub category: RequirementCategory,
    pub priority: RequirementPriority,
    pub status: RequirementStatus,
    #[schema(value_type = Option<String>, format = Date, example = "2025-03-10")]
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
}

impl PendencyItem {
    // BLOCKED conta como incompleto, qualquer que seja a prioridade
    pub fn is_complete(&self) -> bool {
        self.status == RequirementStatus::Completed
    }

    pub fn is_critical(&self) -> bool {
        self.priority == RequirementPriority::Critical
    }
}

// Cache derivado; a fonte da verdade é property_requirements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageCompletionMetric {
    pub property_id: Uuid,
    pub stage: i32,
    pub completed_count: i32,
    pub total_count: i32,
    #[schema(example = 75)]
    pub completion_percentage: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageAdvancementLog {
    pub id: Uuid,
    pub property_id: Uuid,
    pub from_stage: i32,
    pub to_stage: i32,
    pub actor_id: Uuid,
    pub outcome: AdvancementOutcome,
    pub overridden: bool,
    pub pending_count: i32,
    pub critical_pending_count: i32,
    pub completion_percentage: i32,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

// O que vai para stage_advancement_logs, antes de ganhar id e data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdvancementLog {
    pub property_id: Uuid,
    pub from_stage: i32,
    pub to_stage: i32,
    pub actor_id: Uuid,
    pub outcome: AdvancementOutcome,
    pub overridden: bool,
    pub pending_count: i32,
    pub critical_pending_count: i32,
    pub completion_percentage: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendencyNotification {
    pub id: Uuid,
    pub property_id: Uuid,
    pub user_id: Uuid,
    pub notification_id: Uuid,
    pub advancement_log_id: Option<Uuid>,
    pub stage: i32,
    pub pending_count: i32,
    pub created_at: DateTime<Utc>,
}

// --- Resultado do motor de pendências ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendencyValidationResult {
    pub property_id: Uuid,
    // A etapa avaliada (a que está sendo deixada)
    pub stage: i32,
    pub target_stage: Option<i32>,
    pub pendencies: Vec<PendencyItem>,
    pub completed_count: i32,
    pub total_count: i32,
    pub completion_percentage: i32,
    pub critical_pending_count: i32,
    pub can_advance: bool,
}

impl PendencyValidationResult {
    pub fn pending_count(&self) -> i32 {
        self.pendencies.len() as i32
    }

    pub fn blocking_pendencies(&self) -> Vec<PendencyItem> {
        self.pendencies
            .iter()
            .filter(|p| p.is_critical())
            .cloned()
            .collect()
    }
}

// --- Payloads ---

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequirementPayload {
    pub status: RequirementStatus,
    #[schema(value_type = Option<String>, format = Date, example = "2025-03-10")]
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
    #[validate(length(max = 2000, message = "too_long"))]
    pub notes: Option<String>,
    // Campo ausente mantém o valor gravado; as flags abaixo apagam
    #[serde(default)]
    pub clear_due_date: bool,
    #[serde(default)]
    pub clear_assigned_to: bool,
    #[serde(default)]
    pub clear_notes: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirementUpdateResponse {
    pub requirement: PendencyItem,
    pub metric: StageCompletionMetric,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvancementResponse {
    #[serde(flatten)]
    pub property: Property,
    pub advancement_log: StageAdvancementLog,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StageQuery {
    /// Número da etapa (1 a 8)
    pub stage: Option<i32>,
}

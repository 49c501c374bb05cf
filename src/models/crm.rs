// src/models/crm.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

// --- ENUMS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "client_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientType {
    Buyer,
    Seller,
    Tenant,
    Landlord,
    Investor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "note_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteType {
    Note,
    Reminder,
    Call,
    Meeting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "note_priority", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotePriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "note_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteStatus {
    Open,
    InProgress,
    Done,
    Cancelled,
}

// --- CLIENTE ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[schema(example = "Maria da Silva")]
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    // CPF ou CNPJ
    pub document_number: Option<String>,
    pub client_type: ClientType,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientPayload {
    #[validate(length(min = 1, max = 200, message = "required"))]
    #[schema(example = "Maria da Silva")]
    pub full_name: String,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[schema(example = "12345678900")]
    pub document_number: Option<String>,
    pub client_type: Option<ClientType>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientPayload {
    #[validate(length(min = 1, max = 200, message = "required"))]
    pub full_name: Option<String>,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub document_number: Option<String>,
    pub client_type: Option<ClientType>,
    pub notes: Option<String>,
}

// --- ANOTAÇÕES ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientNote {
    pub id: Uuid,
    pub client_id: Uuid,
    pub author_id: Uuid,
    #[schema(example = "Ligar para confirmar visita")]
    pub title: String,
    pub content: String,
    pub note_type: NoteType,
    pub priority: NotePriority,
    pub status: NoteStatus,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub reminder_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotePayload {
    #[validate(length(min = 1, max = 200, message = "required"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 10000, message = "too_long"))]
    pub content: String,
    pub note_type: Option<NoteType>,
    pub priority: Option<NotePriority>,
    pub reminder_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotePayload {
    #[validate(length(min = 1, max = 200, message = "required"))]
    pub title: Option<String>,
    #[validate(length(max = 10000, message = "too_long"))]
    pub content: Option<String>,
    pub note_type: Option<NoteType>,
    pub priority: Option<NotePriority>,
    pub status: Option<NoteStatus>,
    pub is_completed: Option<bool>,
    pub reminder_date: Option<DateTime<Utc>>,
    // `reminderDate: null` não se distingue de ausente; use esta flag para remover o lembrete
    #[serde(default)]
    pub clear_reminder: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteAuditEntry {
    pub id: Uuid,
    pub note_id: Uuid,
    pub actor_id: Uuid,
    #[schema(example = "updated")]
    pub action: String,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Uma linha de auditoria ainda não gravada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteChange {
    pub action: &'static str,
    pub field: Option<&'static str>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

// src/models/notification.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "notification_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    StageAdvanced,
    StageOverridden,
    PendencyAlert,
    Reminder,
}

// pending → sent | failed | cancelled; failed volta a ser tentada a cada varredura
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "scheduled_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduledStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl ScheduledStatus {
    pub fn can_transition_to(self, next: ScheduledStatus) -> bool {
        use ScheduledStatus::*;
        matches!(
            (self, next),
            (Pending, Sent) | (Pending, Failed) | (Pending, Cancelled)
                | (Failed, Sent) | (Failed, Failed) | (Failed, Cancelled)
        )
    }

    // Entra na varredura quando vencida
    pub fn is_deliverable(self) -> bool {
        matches!(self, ScheduledStatus::Pending | ScheduledStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScheduledStatus::Pending => "PENDING",
            ScheduledStatus::Sent => "SENT",
            ScheduledStatus::Failed => "FAILED",
            ScheduledStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    #[schema(example = "Imóvel avançou para Proposta")]
    pub title: String,
    pub message: String,
    pub property_id: Option<Uuid>,
    pub scheduled_notification_id: Option<Uuid>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// Antes de ser gravada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub property_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_note_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: ScheduledStatus,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Resumo de uma rodada da varredura
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub picked: usize,
    pub sent: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ScheduledStatus::*;

    #[test]
    fn pending_and_failed_can_be_delivered_or_cancelled() {
        for from in [Pending, Failed] {
            assert!(from.can_transition_to(Sent));
            assert!(from.can_transition_to(Failed));
            assert!(from.can_transition_to(Cancelled));
            assert!(from.is_deliverable());
        }
    }

    #[test]
    fn sent_and_cancelled_are_terminal() {
        for from in [Sent, Cancelled] {
            for to in [Pending, Sent, Failed, Cancelled] {
                assert!(!from.can_transition_to(to), "{:?} -> {:?}", from, to);
            }
            assert!(!from.is_deliverable());
        }
    }

    #[test]
    fn nothing_goes_back_to_pending() {
        for from in [Pending, Sent, Failed, Cancelled] {
            assert!(!from.can_transition_to(Pending));
        }
    }
}

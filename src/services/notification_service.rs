// src/services/notification_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::NotificationRepository,
    models::{
        auth::CurrentUser,
        notification::{Notification, ScheduledNotification, ScheduledStatus},
    },
};

/// Confere a transição de status de um agendamento.
pub fn ensure_transition(from: ScheduledStatus, to: ScheduledStatus) -> Result<(), AppError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AppError::InvalidStateTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

#[derive(Clone)]
pub struct NotificationService {
    repo: NotificationRepository,
    pool: PgPool,
}

impl NotificationService {
    pub fn new(repo: NotificationRepository, pool: PgPool) -> Self {
        Self { repo, pool }
    }

    pub async fn list(&self, user: &CurrentUser, unread_only: bool) -> Result<Vec<Notification>, AppError> {
        self.repo.list_for_user(user.id, unread_only).await
    }

    pub async fn mark_read(&self, notification_id: Uuid, user: &CurrentUser) -> Result<Notification, AppError> {
        self.repo
            .mark_read(notification_id, user.id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("notification".into()))
    }

    pub async fn list_scheduled(
        &self,
        user: &CurrentUser,
        status: Option<ScheduledStatus>,
    ) -> Result<Vec<ScheduledNotification>, AppError> {
        self.repo.list_scheduled(user.id, status).await
    }

    /// PENDING/FAILED -> CANCELLED. Qualquer outro ponto de partida é 409.
    pub async fn cancel_scheduled(
        &self,
        scheduled_id: Uuid,
        user: &CurrentUser,
    ) -> Result<ScheduledNotification, AppError> {
        let mut tx = self.pool.begin().await?;

        let scheduled = self.repo
            .find_scheduled(&mut *tx, scheduled_id, user.owner_scope())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("scheduled_notification".into()))?;

        ensure_transition(scheduled.status, ScheduledStatus::Cancelled)?;

        let cancelled = self.repo.set_cancelled(&mut *tx, scheduled.id).await?;
        tx.commit().await?;

        tracing::info!("Agendamento {} cancelado por {}", cancelled.id, user.id);
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ScheduledStatus::*;

    #[test]
    fn cancelling_sent_or_cancelled_is_rejected() {
        for from in [Sent, Cancelled] {
            match ensure_transition(from, Cancelled) {
                Err(AppError::InvalidStateTransition { from: f, to }) => {
                    assert_eq!(f, from.as_str());
                    assert_eq!(to, "CANCELLED");
                }
                other => panic!("esperava InvalidStateTransition, veio {:?}", other),
            }
        }
    }

    #[test]
    fn cancelling_pending_or_failed_is_allowed() {
        assert!(ensure_transition(Pending, Cancelled).is_ok());
        assert!(ensure_transition(Failed, Cancelled).is_ok());
    }
}

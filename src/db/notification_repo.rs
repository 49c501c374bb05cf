// src/db/notification_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::notification::{
        NewNotification, Notification, NotificationKind, ScheduledNotification, ScheduledStatus,
    },
};

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // =========================================================================
    //  NOTIFICAÇÕES IN-APP
    // =========================================================================

    pub async fn insert<'e, E>(&self, executor: E, input: &NewNotification) -> Result<Notification, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, kind, title, message, property_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.user_id)
        .bind(input.kind)
        .bind(&input.title)
        .bind(&input.message)
        .bind(input.property_id)
        .fetch_one(executor)
        .await?;

        Ok(notification)
    }

    pub async fn list_for_user(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC
            LIMIT 200
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<Option<Notification>, AppError> {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // =========================================================================
    //  NOTIFICAÇÕES AGENDADAS
    // =========================================================================

    pub async fn insert_scheduled<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        client_note_id: Option<Uuid>,
        title: &str,
        message: &str,
        scheduled_for: DateTime<Utc>,
    ) -> Result<ScheduledNotification, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            INSERT INTO scheduled_notifications (user_id, client_note_id, title, message, scheduled_for)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(client_note_id)
        .bind(title)
        .bind(message)
        .bind(scheduled_for)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    // O agendamento ainda "vivo" (PENDING ou FAILED) de uma anotação
    pub async fn find_active_for_note<'e, E>(
        &self,
        executor: E,
        client_note_id: Uuid,
    ) -> Result<Option<ScheduledNotification>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            SELECT * FROM scheduled_notifications
            WHERE client_note_id = $1 AND status IN ('PENDING', 'FAILED')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(client_note_id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn find_for_note<'e, E>(
        &self,
        executor: E,
        client_note_id: Uuid,
    ) -> Result<Vec<ScheduledNotification>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, ScheduledNotification>(
            "SELECT * FROM scheduled_notifications WHERE client_note_id = $1 ORDER BY created_at",
        )
        .bind(client_note_id)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    // Novo horário volta o agendamento para PENDING e zera as tentativas
    pub async fn reschedule<'e, E>(
        &self,
        executor: E,
        scheduled_id: Uuid,
        scheduled_for: DateTime<Utc>,
        title: &str,
        message: &str,
    ) -> Result<ScheduledNotification, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            UPDATE scheduled_notifications
            SET scheduled_for = $2, title = $3, message = $4,
                status = 'PENDING', retry_count = 0, last_error = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(scheduled_id)
        .bind(scheduled_for)
        .bind(title)
        .bind(message)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    pub async fn find_scheduled<'e, E>(
        &self,
        executor: E,
        scheduled_id: Uuid,
        user_scope: Option<Uuid>,
    ) -> Result<Option<ScheduledNotification>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            SELECT * FROM scheduled_notifications
            WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2)
            FOR UPDATE
            "#,
        )
        .bind(scheduled_id)
        .bind(user_scope)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn list_scheduled(
        &self,
        user_id: Uuid,
        status: Option<ScheduledStatus>,
    ) -> Result<Vec<ScheduledNotification>, AppError> {
        let rows = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            SELECT * FROM scheduled_notifications
            WHERE user_id = $1 AND ($2::scheduled_status IS NULL OR status = $2)
            ORDER BY scheduled_for
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn set_cancelled<'e, E>(&self, executor: E, scheduled_id: Uuid) -> Result<ScheduledNotification, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            UPDATE scheduled_notifications
            SET status = 'CANCELLED', updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(scheduled_id)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    pub async fn cancel_active_for_note<'e, E>(&self, executor: E, client_note_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_notifications
            SET status = 'CANCELLED', updated_at = NOW()
            WHERE client_note_id = $1 AND status IN ('PENDING', 'FAILED')
            "#,
        )
        .bind(client_note_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    //  VARREDURA
    // =========================================================================

    /// Pega um lote vencido e trava as linhas. SKIP LOCKED garante que duas
    /// varreduras simultâneas nunca peguem o mesmo agendamento.
    pub async fn claim_due<'e, E>(
        &self,
        executor: E,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ScheduledNotification>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            SELECT * FROM scheduled_notifications
            WHERE status IN ('PENDING', 'FAILED') AND scheduled_for <= $1
            ORDER BY scheduled_for
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    // A constraint única em scheduled_notification_id impede duas notificações para a mesma origem
    pub async fn insert_from_schedule<'e, E>(
        &self,
        executor: E,
        source: &ScheduledNotification,
    ) -> Result<Option<Notification>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, kind, title, message, scheduled_notification_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (scheduled_notification_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(source.user_id)
        .bind(NotificationKind::Reminder)
        .bind(&source.title)
        .bind(&source.message)
        .bind(source.id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn mark_sent<'e, E>(&self, executor: E, scheduled_id: Uuid, now: DateTime<Utc>) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE scheduled_notifications
            SET status = 'SENT', sent_at = $2, last_error = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(scheduled_id)
        .bind(now)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn mark_failed<'e, E>(&self, executor: E, scheduled_id: Uuid, error: &str) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE scheduled_notifications
            SET status = 'FAILED', retry_count = retry_count + 1, last_error = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(scheduled_id)
        .bind(error)
        .execute(executor)
        .await?;

        Ok(())
    }
}

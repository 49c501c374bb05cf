// src/db/pendency_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::pendency::{
        NewAdvancementLog, PendencyItem, PendencyNotification, StageAdvancementLog,
        StageCompletionMetric, StageRequirement, UpdateRequirementPayload,
    },
};

// Requisito do imóvel + dados da configuração da etapa
const ITEM_COLUMNS: &str = r#"
    pr.id, pr.property_id, pr.requirement_id, pr.stage,
    sr.name, sr.description, sr.category, sr.priority,
    pr.status, pr.due_date, pr.assigned_to, pr.notes,
    pr.completed_at, pr.completed_by
"#;

#[derive(Clone)]
pub struct PendencyRepository {
    pool: PgPool,
}

impl PendencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  CONFIGURAÇÃO DAS ETAPAS
    // =========================================================================

    pub async fn list_stage_requirements(&self, stage: Option<i32>) -> Result<Vec<StageRequirement>, AppError> {
        let requirements = sqlx::query_as::<_, StageRequirement>(
            r#"
            SELECT * FROM stage_requirements
            WHERE is_active AND ($1::int IS NULL OR stage = $1)
            ORDER BY stage, sort_order, name
            "#,
        )
        .bind(stage)
        .fetch_all(&self.pool)
        .await?;

        Ok(requirements)
    }

    // =========================================================================
    //  REQUISITOS DO IMÓVEL
    // =========================================================================

    /// Cria as linhas de property_requirements que ainda não existem.
    /// `stage = None` instancia o checklist de todas as etapas.
    pub async fn instantiate_requirements<'e, E>(
        &self,
        executor: E,
        property_id: Uuid,
        stage: Option<i32>,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO property_requirements (property_id, requirement_id, stage)
            SELECT $1, sr.id, sr.stage
            FROM stage_requirements sr
            WHERE sr.is_active AND ($2::int IS NULL OR sr.stage = $2)
            ON CONFLICT (property_id, requirement_id) DO NOTHING
            "#,
        )
        .bind(property_id)
        .bind(stage)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn list_property_requirements<'e, E>(
        &self,
        executor: E,
        property_id: Uuid,
        stage: Option<i32>,
    ) -> Result<Vec<PendencyItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM property_requirements pr
            JOIN stage_requirements sr ON sr.id = pr.requirement_id
            WHERE pr.property_id = $1 AND ($2::int IS NULL OR pr.stage = $2)
            ORDER BY pr.stage, sr.sort_order, sr.name
            "#
        );

        let items = sqlx::query_as::<_, PendencyItem>(&sql)
            .bind(property_id)
            .bind(stage)
            .fetch_all(executor)
            .await?;

        Ok(items)
    }

    pub async fn update_requirement<'e, E>(
        &self,
        executor: E,
        property_id: Uuid,
        property_requirement_id: Uuid,
        input: &UpdateRequirementPayload,
        actor_id: Uuid,
    ) -> Result<Option<PendencyItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let is_completed = input.status == crate::models::pendency::RequirementStatus::Completed;

        let sql = format!(
            r#"
            WITH pr AS (
                UPDATE property_requirements SET
                    status = $3,
                    due_date = CASE WHEN $9 THEN NULL ELSE COALESCE($4, due_date) END,
                    assigned_to = CASE WHEN $10 THEN NULL ELSE COALESCE($5, assigned_to) END,
                    notes = CASE WHEN $11 THEN NULL ELSE COALESCE($6, notes) END,
                    completed_at = CASE WHEN $7 THEN COALESCE(completed_at, NOW()) ELSE NULL END,
                    completed_by = CASE WHEN $7 THEN COALESCE(completed_by, $8) ELSE NULL END,
                    updated_at = NOW()
                WHERE id = $2 AND property_id = $1
                RETURNING *
            )
            SELECT {ITEM_COLUMNS}
            FROM pr
            JOIN stage_requirements sr ON sr.id = pr.requirement_id
            "#
        );

        let item = sqlx::query_as::<_, PendencyItem>(&sql)
            .bind(property_id)
            .bind(property_requirement_id)
            .bind(input.status)
            .bind(input.due_date)
            .bind(input.assigned_to)
            .bind(&input.notes)
            .bind(is_completed)
            .bind(actor_id)
            .bind(input.clear_due_date)
            .bind(input.clear_assigned_to)
            .bind(input.clear_notes)
            .fetch_optional(executor)
            .await?;

        Ok(item)
    }

    // =========================================================================
    //  MÉTRICAS (CACHE)
    // =========================================================================

    pub async fn upsert_metric<'e, E>(
        &self,
        executor: E,
        property_id: Uuid,
        stage: i32,
        completed_count: i32,
        total_count: i32,
        completion_percentage: i32,
    ) -> Result<StageCompletionMetric, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let metric = sqlx::query_as::<_, StageCompletionMetric>(
            r#"
            INSERT INTO stage_completion_metrics (
                property_id, stage, completed_count, total_count, completion_percentage, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (property_id, stage) DO UPDATE SET
                completed_count = EXCLUDED.completed_count,
                total_count = EXCLUDED.total_count,
                completion_percentage = EXCLUDED.completion_percentage,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(property_id)
        .bind(stage)
        .bind(completed_count)
        .bind(total_count)
        .bind(completion_percentage)
        .fetch_one(executor)
        .await?;

        Ok(metric)
    }

    pub async fn list_metrics<'e, E>(&self, executor: E, property_id: Uuid) -> Result<Vec<StageCompletionMetric>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let metrics = sqlx::query_as::<_, StageCompletionMetric>(
            "SELECT * FROM stage_completion_metrics WHERE property_id = $1 ORDER BY stage",
        )
        .bind(property_id)
        .fetch_all(executor)
        .await?;

        Ok(metrics)
    }

    // =========================================================================
    //  AUDITORIA DE AVANÇO (somente inserção)
    // =========================================================================

    pub async fn insert_advancement_log<'e, E>(
        &self,
        executor: E,
        log: &NewAdvancementLog,
    ) -> Result<StageAdvancementLog, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, StageAdvancementLog>(
            r#"
            INSERT INTO stage_advancement_logs (
                property_id, from_stage, to_stage, actor_id, outcome, overridden,
                pending_count, critical_pending_count, completion_percentage, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(log.property_id)
        .bind(log.from_stage)
        .bind(log.to_stage)
        .bind(log.actor_id)
        .bind(log.outcome)
        .bind(log.overridden)
        .bind(log.pending_count)
        .bind(log.critical_pending_count)
        .bind(log.completion_percentage)
        .bind(&log.reason)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    pub async fn list_advancement_logs<'e, E>(
        &self,
        executor: E,
        property_id: Uuid,
    ) -> Result<Vec<StageAdvancementLog>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let logs = sqlx::query_as::<_, StageAdvancementLog>(
            "SELECT * FROM stage_advancement_logs WHERE property_id = $1 ORDER BY created_at, id",
        )
        .bind(property_id)
        .fetch_all(executor)
        .await?;

        Ok(logs)
    }

    // =========================================================================
    //  NOTIFICAÇÕES DE PENDÊNCIA
    // =========================================================================

    pub async fn insert_pendency_notification<'e, E>(
        &self,
        executor: E,
        property_id: Uuid,
        user_id: Uuid,
        notification_id: Uuid,
        advancement_log_id: Option<Uuid>,
        stage: i32,
        pending_count: i32,
    ) -> Result<PendencyNotification, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, PendencyNotification>(
            r#"
            INSERT INTO pendency_notifications (
                property_id, user_id, notification_id, advancement_log_id, stage, pending_count
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(property_id)
        .bind(user_id)
        .bind(notification_id)
        .bind(advancement_log_id)
        .bind(stage)
        .bind(pending_count)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    pub async fn list_pendency_notifications(&self, user_id: Uuid) -> Result<Vec<PendencyNotification>, AppError> {
        let rows = sqlx::query_as::<_, PendencyNotification>(
            "SELECT * FROM pendency_notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT 200",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

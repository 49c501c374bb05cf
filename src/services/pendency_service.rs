// src/services/pendency_service.rs

use std::cmp::Reverse;

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{NotificationRepository, PendencyRepository, PropertyRepository},
    models::{
        auth::CurrentUser,
        notification::{NewNotification, NotificationKind},
        pendency::{
            PendencyItem, PendencyNotification, PendencyValidationResult, RequirementStatus,
            RequirementUpdateResponse, StageAdvancementLog, StageCompletionMetric, StageRequirement,
            UpdateRequirementPayload,
        },
        property::{Property, PropertyStage},
    },
};

// =========================================================================
//  MOTOR DE PENDÊNCIAS (cálculo puro)
// =========================================================================

/// round(completed / total * 100), com etapa vazia valendo 100%.
pub fn completion_percentage(completed: i32, total: i32) -> i32 {
    if total <= 0 {
        return 100;
    }
    // Arredondamento meio-para-cima sem ponto flutuante
    (completed * 200 + total) / (2 * total)
}

/// Avalia os requisitos de uma etapa. Só pendências CRITICAL impedem o avanço;
/// as demais são apenas avisos.
pub fn evaluate(
    property_id: Uuid,
    stage: i32,
    target_stage: Option<i32>,
    items: &[PendencyItem],
) -> PendencyValidationResult {
    let stage_items: Vec<&PendencyItem> = items.iter().filter(|i| i.stage == stage).collect();

    let total_count = stage_items.len() as i32;
    let completed_count = stage_items.iter().filter(|i| i.is_complete()).count() as i32;

    let mut pendencies: Vec<PendencyItem> = stage_items
        .into_iter()
        .filter(|i| !i.is_complete())
        .cloned()
        .collect();
    // Críticas primeiro; dentro da mesma prioridade mantém a ordem configurada
    pendencies.sort_by_key(|p| Reverse(p.priority));

    let critical_pending_count = pendencies.iter().filter(|p| p.is_critical()).count() as i32;

    PendencyValidationResult {
        property_id,
        stage,
        target_stage,
        pendencies,
        completed_count,
        total_count,
        completion_percentage: completion_percentage(completed_count, total_count),
        critical_pending_count,
        can_advance: critical_pending_count == 0,
    }
}

/// (concluídos, total, percentual) de uma etapa, para o cache de métricas.
pub fn stage_counts(items: &[PendencyItem], stage: i32) -> (i32, i32, i32) {
    let (completed, total) = items
        .iter()
        .filter(|i| i.stage == stage)
        .fold((0, 0), |(done, all), item| (done + item.is_complete() as i32, all + 1));
    (completed, total, completion_percentage(completed, total))
}

// =========================================================================
//  SERVIÇO
// =========================================================================

#[derive(Clone)]
pub struct PendencyService {
    pendency_repo: PendencyRepository,
    property_repo: PropertyRepository,
    notification_repo: NotificationRepository,
    pool: PgPool,
}

impl PendencyService {
    pub fn new(
        pendency_repo: PendencyRepository,
        property_repo: PropertyRepository,
        notification_repo: NotificationRepository,
        pool: PgPool,
    ) -> Self {
        Self { pendency_repo, property_repo, notification_repo, pool }
    }

    async fn property_in_scope(&self, property_id: Uuid, user: &CurrentUser) -> Result<Property, AppError> {
        self.property_repo
            .find(&self.pool, property_id, user.owner_scope())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("property".into()))
    }

    /// Pendências da etapa atual do imóvel.
    pub async fn validate(&self, property_id: Uuid, user: &CurrentUser) -> Result<PendencyValidationResult, AppError> {
        let property = self.property_in_scope(property_id, user).await?;
        let items = self.pendency_repo
            .list_property_requirements(&self.pool, property.id, Some(property.current_stage))
            .await?;

        Ok(evaluate(property.id, property.current_stage, None, &items))
    }

    pub async fn list_requirements(
        &self,
        property_id: Uuid,
        stage: Option<i32>,
        user: &CurrentUser,
    ) -> Result<Vec<PendencyItem>, AppError> {
        if let Some(stage) = stage {
            PropertyStage::from_number(stage).ok_or(AppError::InvalidStage(stage))?;
        }
        let property = self.property_in_scope(property_id, user).await?;
        self.pendency_repo.list_property_requirements(&self.pool, property.id, stage).await
    }

    pub async fn list_stage_requirements(&self, stage: Option<i32>) -> Result<Vec<StageRequirement>, AppError> {
        if let Some(stage) = stage {
            PropertyStage::from_number(stage).ok_or(AppError::InvalidStage(stage))?;
        }
        self.pendency_repo.list_stage_requirements(stage).await
    }

    pub async fn list_advancement_logs(
        &self,
        property_id: Uuid,
        user: &CurrentUser,
    ) -> Result<Vec<StageAdvancementLog>, AppError> {
        let property = self.property_in_scope(property_id, user).await?;
        self.pendency_repo.list_advancement_logs(&self.pool, property.id).await
    }

    pub async fn list_metrics(
        &self,
        property_id: Uuid,
        user: &CurrentUser,
    ) -> Result<Vec<StageCompletionMetric>, AppError> {
        let property = self.property_in_scope(property_id, user).await?;
        self.pendency_repo.list_metrics(&self.pool, property.id).await
    }

    pub async fn list_pendency_notifications(&self, user: &CurrentUser) -> Result<Vec<PendencyNotification>, AppError> {
        self.pendency_repo.list_pendency_notifications(user.id).await
    }

    /// Atualiza o status de um requisito e recalcula a métrica da etapa na mesma transação.
    /// Requisito BLOCKED gera um alerta para o dono do imóvel.
    pub async fn update_requirement(
        &self,
        property_id: Uuid,
        property_requirement_id: Uuid,
        payload: &UpdateRequirementPayload,
        user: &CurrentUser,
    ) -> Result<RequirementUpdateResponse, AppError> {
        let mut tx = self.pool.begin().await?;

        let property = self.property_repo
            .find(&mut *tx, property_id, user.owner_scope())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("property".into()))?;

        let requirement = self.pendency_repo
            .update_requirement(&mut *tx, property.id, property_requirement_id, payload, user.id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("requirement".into()))?;

        let metric = self.refresh_metric(&mut tx, property.id, requirement.stage).await?;

        if requirement.status == RequirementStatus::Blocked {
            let notification = self.notification_repo
                .insert(
                    &mut *tx,
                    &NewNotification {
                        user_id: property.owner_id,
                        kind: NotificationKind::PendencyAlert,
                        title: format!("Pendência bloqueada: {}", requirement.name),
                        message: format!(
                            "O requisito \"{}\" do imóvel \"{}\" está bloqueado na etapa {}.",
                            requirement.name, property.title, requirement.stage
                        ),
                        property_id: Some(property.id),
                    },
                )
                .await?;

            let pending = metric.total_count - metric.completed_count;
            self.pendency_repo
                .insert_pendency_notification(
                    &mut *tx,
                    property.id,
                    property.owner_id,
                    notification.id,
                    None,
                    requirement.stage,
                    pending,
                )
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Requisito {} do imóvel {} -> {:?} ({}%)",
            requirement.id,
            property.id,
            requirement.status,
            metric.completion_percentage
        );

        Ok(RequirementUpdateResponse { requirement, metric })
    }

    /// Recalcula o cache da etapa a partir de property_requirements.
    pub async fn refresh_metric(
        &self,
        conn: &mut PgConnection,
        property_id: Uuid,
        stage: i32,
    ) -> Result<StageCompletionMetric, AppError> {
        let items = self.pendency_repo
            .list_property_requirements(&mut *conn, property_id, Some(stage))
            .await?;
        let (completed, total, percentage) = stage_counts(&items, stage);

        self.pendency_repo
            .upsert_metric(&mut *conn, property_id, stage, completed, total, percentage)
            .await
    }
}

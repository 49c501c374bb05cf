// src/services/advancement_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{NotificationRepository, PendencyRepository, PropertyRepository},
    models::{
        auth::CurrentUser,
        notification::{NewNotification, NotificationKind},
        pendency::{
            AdvancementOutcome, AdvancementResponse, NewAdvancementLog, PendencyValidationResult,
        },
        property::{AdvanceStagePayload, Property, PropertyStage},
    },
    services::pendency_service::{evaluate, PendencyService},
};

/// Decide o resultado de uma tentativa de avanço a partir da avaliação da etapa atual.
/// Qualquer mudança de etapa, para frente ou para trás, passa pelo bloqueio de pendências.
pub fn plan_advancement(
    property: &Property,
    target: PropertyStage,
    validation: &PendencyValidationResult,
    actor_id: Uuid,
    force: bool,
    reason: Option<String>,
) -> NewAdvancementLog {
    let moves = target.number() != property.current_stage;
    let pending_count = validation.pending_count();

    let (outcome, overridden) = if moves && !validation.can_advance && !force {
        (AdvancementOutcome::Blocked, false)
    } else if moves && force && pending_count > 0 {
        (AdvancementOutcome::Overridden, true)
    } else {
        (AdvancementOutcome::Allowed, false)
    };

    NewAdvancementLog {
        property_id: property.id,
        from_stage: property.current_stage,
        to_stage: target.number(),
        actor_id,
        outcome,
        overridden,
        pending_count,
        critical_pending_count: validation.critical_pending_count,
        completion_percentage: validation.completion_percentage,
        reason,
    }
}

fn notification_for(property: &Property, log: &NewAdvancementLog, target: PropertyStage) -> NewNotification {
    let from_label = PropertyStage::from_number(log.from_stage)
        .map(PropertyStage::label)
        .unwrap_or("?");

    let (kind, title) = if log.overridden {
        (
            NotificationKind::StageOverridden,
            format!("Imóvel avançou para {} com pendências", target.label()),
        )
    } else {
        (NotificationKind::StageAdvanced, format!("Imóvel avançou para {}", target.label()))
    };

    let mut message = format!(
        "\"{}\" passou de {} para {}.",
        property.title,
        from_label,
        target.label()
    );
    if log.pending_count > 0 {
        message.push_str(&format!(" {} pendência(s) em aberto na etapa anterior.", log.pending_count));
    }

    NewNotification {
        user_id: property.owner_id,
        kind,
        title,
        message,
        property_id: Some(property.id),
    }
}

#[derive(Clone)]
pub struct AdvancementService {
    property_repo: PropertyRepository,
    pendency_repo: PendencyRepository,
    notification_repo: NotificationRepository,
    pendency_service: PendencyService,
    pool: PgPool,
}

impl AdvancementService {
    pub fn new(
        property_repo: PropertyRepository,
        pendency_repo: PendencyRepository,
        notification_repo: NotificationRepository,
        pendency_service: PendencyService,
        pool: PgPool,
    ) -> Self {
        Self { property_repo, pendency_repo, notification_repo, pendency_service, pool }
    }

    /// Valida, registra e aplica o avanço. Tudo numa transação só, com o imóvel travado.
    pub async fn advance(
        &self,
        property_id: Uuid,
        payload: AdvanceStagePayload,
        user: &CurrentUser,
    ) -> Result<AdvancementResponse, AppError> {
        let target = PropertyStage::from_number(payload.target_stage)
            .ok_or(AppError::InvalidStage(payload.target_stage))?;

        let mut tx = self.pool.begin().await?;

        let property = self.property_repo
            .find_for_update(&mut *tx, property_id, user.owner_scope())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("property".into()))?;

        let items = self.pendency_repo
            .list_property_requirements(&mut *tx, property.id, Some(property.current_stage))
            .await?;
        let validation = evaluate(property.id, property.current_stage, Some(target.number()), &items);

        let plan = plan_advancement(&property, target, &validation, user.id, payload.force, payload.reason);

        if plan.outcome == AdvancementOutcome::Blocked {
            // A tentativa bloqueada também fica na auditoria; o imóvel não muda
            self.pendency_repo.insert_advancement_log(&mut *tx, &plan).await?;
            tx.commit().await?;

            tracing::warn!(
                "⛔ Avanço bloqueado: imóvel {} {} -> {} ({} pendência(s) crítica(s))",
                property.id,
                plan.from_stage,
                plan.to_stage,
                plan.critical_pending_count
            );
            return Err(AppError::PendenciesOutstanding(validation.blocking_pendencies()));
        }

        let log = self.pendency_repo.insert_advancement_log(&mut *tx, &plan).await?;
        let updated = self.property_repo.update_stage(&mut *tx, property.id, target).await?;

        self.pendency_repo
            .instantiate_requirements(&mut *tx, property.id, Some(target.number()))
            .await?;
        self.pendency_service.refresh_metric(&mut tx, property.id, plan.from_stage).await?;
        if plan.to_stage != plan.from_stage {
            self.pendency_service.refresh_metric(&mut tx, property.id, plan.to_stage).await?;

            let notification = self.notification_repo
                .insert(&mut *tx, &notification_for(&property, &plan, target))
                .await?;
            self.pendency_repo
                .insert_pendency_notification(
                    &mut *tx,
                    property.id,
                    property.owner_id,
                    notification.id,
                    Some(log.id),
                    plan.from_stage,
                    plan.pending_count,
                )
                .await?;
        }

        tx.commit().await?;

        match plan.outcome {
            AdvancementOutcome::Overridden => tracing::warn!(
                "⚠️ Avanço forçado: imóvel {} {} -> {} por {} com {} pendência(s)",
                property.id,
                plan.from_stage,
                plan.to_stage,
                user.id,
                plan.pending_count
            ),
            _ => tracing::info!(
                "✅ Avanço permitido: imóvel {} {} -> {} por {}",
                property.id,
                plan.from_stage,
                plan.to_stage,
                user.id
            ),
        }

        Ok(AdvancementResponse { property: updated, advancement_log: log })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pendency::{RequirementPriority::*, RequirementStatus::*};
    use crate::services::pendency_service::tests::item;
    use chrono::Utc;

    fn property_at(stage: i32) -> Property {
        Property {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            client_id: None,
            cartorio_id: None,
            title: "Casa térrea".into(),
            street: "Rua das Flores".into(),
            number: Some("10".into()),
            complement: None,
            neighborhood: None,
            city: "Campinas".into(),
            state: "SP".into(),
            zip_code: None,
            value: None,
            registration_number: None,
            iptu_number: None,
            status: PropertyStage::from_number(stage).unwrap(),
            current_stage: stage,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn critical_pendency_blocks_forward_move_without_force() {
        let property = property_at(3);
        let validation = evaluate(property.id, 3, Some(4), &[item(3, Critical, Pending)]);

        let plan = plan_advancement(&property, PropertyStage::Proposta, &validation, Uuid::nil(), false, None);

        assert_eq!(plan.outcome, AdvancementOutcome::Blocked);
        assert!(!plan.overridden);
        assert_eq!((plan.from_stage, plan.to_stage), (3, 4));
        assert_eq!(plan.critical_pending_count, 1);
    }

    #[test]
    fn force_with_pendencies_is_recorded_as_override() {
        let property = property_at(3);
        let validation = evaluate(property.id, 3, Some(4), &[item(3, Critical, Pending), item(3, Low, Completed)]);

        let plan = plan_advancement(
            &property,
            PropertyStage::Proposta,
            &validation,
            Uuid::nil(),
            true,
            Some("Cliente assinou hoje".into()),
        );

        assert_eq!(plan.outcome, AdvancementOutcome::Overridden);
        assert!(plan.overridden);
        assert_eq!(plan.pending_count, 1);
        assert_eq!(plan.completion_percentage, 50);
        assert_eq!(plan.reason.as_deref(), Some("Cliente assinou hoje"));
    }

    #[test]
    fn force_without_pendencies_is_a_clean_advance() {
        let property = property_at(2);
        let validation = evaluate(property.id, 2, Some(3), &[item(2, Critical, Completed)]);

        let plan = plan_advancement(&property, PropertyStage::Mercado, &validation, Uuid::nil(), true, None);

        assert_eq!(plan.outcome, AdvancementOutcome::Allowed);
        assert!(!plan.overridden);
    }

    #[test]
    fn advisory_pendencies_do_not_block() {
        let property = property_at(5);
        let validation = evaluate(property.id, 5, Some(6), &[item(5, High, Blocked)]);

        let plan = plan_advancement(&property, PropertyStage::Financiamento, &validation, Uuid::nil(), false, None);

        assert_eq!(plan.outcome, AdvancementOutcome::Allowed);
        assert_eq!(plan.pending_count, 1);
    }

    #[test]
    fn critical_pendency_blocks_backward_move_without_force() {
        let property = property_at(4);
        let validation = evaluate(property.id, 4, Some(2), &[item(4, Critical, Pending)]);

        let plan = plan_advancement(&property, PropertyStage::Diligence, &validation, Uuid::nil(), false, None);

        assert!(!validation.can_advance);
        assert_eq!(plan.outcome, AdvancementOutcome::Blocked);
        assert!(!plan.overridden);
        assert_eq!((plan.from_stage, plan.to_stage), (4, 2));
    }

    #[test]
    fn forced_backward_move_with_pendencies_is_an_override() {
        let property = property_at(4);
        let validation = evaluate(property.id, 4, Some(2), &[item(4, Critical, Pending)]);

        let plan = plan_advancement(&property, PropertyStage::Diligence, &validation, Uuid::nil(), true, None);

        assert_eq!(plan.outcome, AdvancementOutcome::Overridden);
        assert!(plan.overridden);
    }

    // Repetir o avanço para a etapa atual não muda nada, mas cada chamada gera seu próprio registro
    #[test]
    fn repeated_no_op_advance_still_produces_a_log_each_time() {
        let property = property_at(4);
        let validation = evaluate(property.id, 4, Some(4), &[item(4, Critical, Pending)]);

        let first = plan_advancement(&property, PropertyStage::Proposta, &validation, Uuid::nil(), false, None);
        let second = plan_advancement(&property, PropertyStage::Proposta, &validation, Uuid::nil(), false, None);

        assert_eq!(first.outcome, AdvancementOutcome::Allowed);
        assert_eq!(first, second);
        assert_eq!((first.from_stage, first.to_stage), (4, 4));
    }

    #[test]
    fn overridden_notification_mentions_pendencies() {
        let property = property_at(3);
        let validation = evaluate(property.id, 3, Some(4), &[item(3, Critical, Pending)]);
        let plan = plan_advancement(&property, PropertyStage::Proposta, &validation, Uuid::nil(), true, None);

        let notification = notification_for(&property, &plan, PropertyStage::Proposta);

        assert_eq!(notification.kind, NotificationKind::StageOverridden);
        assert_eq!(notification.user_id, property.owner_id);
        assert!(notification.title.contains("Proposta"));
        assert!(notification.message.contains("1 pendência"));
    }
}

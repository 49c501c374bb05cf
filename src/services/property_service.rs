// src/services/property_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CrmRepository, PendencyRepository, PropertyRepository, RegistryRepository},
    models::{
        auth::CurrentUser,
        property::{CreatePropertyPayload, Property, PropertyStage, UpdatePropertyPayload},
    },
    services::pendency_service::stage_counts,
};

#[derive(Clone)]
pub struct PropertyService {
    property_repo: PropertyRepository,
    pendency_repo: PendencyRepository,
    crm_repo: CrmRepository,
    registry_repo: RegistryRepository,
    pool: PgPool,
}

impl PropertyService {
    pub fn new(
        property_repo: PropertyRepository,
        pendency_repo: PendencyRepository,
        crm_repo: CrmRepository,
        registry_repo: RegistryRepository,
        pool: PgPool,
    ) -> Self {
        Self { property_repo, pendency_repo, crm_repo, registry_repo, pool }
    }

    /// Cadastra o imóvel na captação e já instancia o checklist de todas as etapas.
    pub async fn create(&self, payload: &CreatePropertyPayload, user: &CurrentUser) -> Result<Property, AppError> {
        let owner_id = match payload.owner_id {
            Some(owner_id) if owner_id != user.id && !user.is_admin() => return Err(AppError::Forbidden),
            Some(owner_id) => owner_id,
            None => user.id,
        };

        let mut tx = self.pool.begin().await?;

        if let Some(client_id) = payload.client_id {
            // O cliente precisa ser do mesmo dono do imóvel
            let scope = if user.is_admin() { Some(owner_id) } else { user.owner_scope() };
            self.crm_repo
                .find_client(&mut *tx, client_id, scope)
                .await?
                .ok_or_else(|| AppError::ResourceNotFound("client".into()))?;
        }
        if let Some(cartorio_id) = payload.cartorio_id {
            self.registry_repo
                .find_cartorio(&mut *tx, cartorio_id)
                .await?
                .ok_or_else(|| AppError::ResourceNotFound("cartorio".into()))?;
        }

        let property = self.property_repo.create(&mut *tx, owner_id, payload).await?;

        let created = self.pendency_repo
            .instantiate_requirements(&mut *tx, property.id, None)
            .await?;
        let items = self.pendency_repo
            .list_property_requirements(&mut *tx, property.id, None)
            .await?;
        for stage in PropertyStage::ALL {
            let (completed, total, percentage) = stage_counts(&items, stage.number());
            self.pendency_repo
                .upsert_metric(&mut *tx, property.id, stage.number(), completed, total, percentage)
                .await?;
        }

        tx.commit().await?;

        tracing::info!("🏠 Imóvel {} cadastrado para {} ({} requisitos)", property.id, owner_id, created);
        Ok(property)
    }

    pub async fn list(&self, user: &CurrentUser) -> Result<Vec<Property>, AppError> {
        self.property_repo.list(&self.pool, user.owner_scope()).await
    }

    pub async fn get(&self, property_id: Uuid, user: &CurrentUser) -> Result<Property, AppError> {
        self.property_repo
            .find(&self.pool, property_id, user.owner_scope())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("property".into()))
    }

    pub async fn update(
        &self,
        property_id: Uuid,
        payload: &UpdatePropertyPayload,
        user: &CurrentUser,
    ) -> Result<Property, AppError> {
        if let Some(cartorio_id) = payload.cartorio_id {
            self.registry_repo
                .find_cartorio(&self.pool, cartorio_id)
                .await?
                .ok_or_else(|| AppError::ResourceNotFound("cartorio".into()))?;
        }
        if let Some(client_id) = payload.client_id {
            self.crm_repo
                .find_client(&self.pool, client_id, user.owner_scope())
                .await?
                .ok_or_else(|| AppError::ResourceNotFound("client".into()))?;
        }

        self.property_repo
            .update(&self.pool, property_id, user.owner_scope(), payload)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("property".into()))
    }

    pub async fn delete(&self, property_id: Uuid, user: &CurrentUser) -> Result<(), AppError> {
        if !user.is_admin() {
            return Err(AppError::Forbidden);
        }
        if !self.property_repo.delete(&self.pool, property_id).await? {
            return Err(AppError::ResourceNotFound("property".into()));
        }
        tracing::warn!("🗑️ Imóvel {} excluído pelo admin {}", property_id, user.id);
        Ok(())
    }
}

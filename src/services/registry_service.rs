// src/services/registry_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{PropertyRepository, RegistryRepository},
    models::{
        auth::CurrentUser,
        registry::{
            Cartorio, CartorioFilter, CreateCartorioPayload, CreateRegistroPayload, Registro,
            RegistroStatus, UpdateRegistroPayload,
        },
    },
};

fn status_label(status: RegistroStatus) -> String {
    match serde_json::to_value(status) {
        Ok(serde_json::Value::String(s)) => s,
        _ => format!("{:?}", status),
    }
}

/// Registro encerrado (registrado ou cancelado) não volta a andar.
pub fn ensure_registro_transition(from: RegistroStatus, to: RegistroStatus) -> Result<(), AppError> {
    if from != to && from.is_final() {
        return Err(AppError::InvalidStateTransition { from: status_label(from), to: status_label(to) });
    }
    Ok(())
}

#[derive(Clone)]
pub struct RegistryService {
    repo: RegistryRepository,
    property_repo: PropertyRepository,
    pool: PgPool,
}

impl RegistryService {
    pub fn new(repo: RegistryRepository, property_repo: PropertyRepository, pool: PgPool) -> Self {
        Self { repo, property_repo, pool }
    }

    // --- Cartórios ---

    pub async fn create_cartorio(&self, payload: &CreateCartorioPayload) -> Result<Cartorio, AppError> {
        let cartorio = self.repo.create_cartorio(payload).await?;
        tracing::info!("Cartório {} cadastrado ({} / {})", cartorio.id, cartorio.city, cartorio.state);
        Ok(cartorio)
    }

    pub async fn list_cartorios(&self, filter: &CartorioFilter) -> Result<Vec<Cartorio>, AppError> {
        self.repo.list_cartorios(filter).await
    }

    pub async fn get_cartorio(&self, cartorio_id: Uuid) -> Result<Cartorio, AppError> {
        self.repo
            .find_cartorio(&self.pool, cartorio_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("cartorio".into()))
    }

    // --- Registros ---

    pub async fn create_registro(
        &self,
        payload: &CreateRegistroPayload,
        user: &CurrentUser,
    ) -> Result<Registro, AppError> {
        let mut tx = self.pool.begin().await?;

        self.property_repo
            .find(&mut *tx, payload.property_id, user.owner_scope())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("property".into()))?;
        self.repo
            .find_cartorio(&mut *tx, payload.cartorio_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("cartorio".into()))?;

        let registro = self.repo.create_registro(&mut *tx, payload).await?;
        tx.commit().await?;

        tracing::info!("Registro {} aberto para o imóvel {}", registro.id, registro.property_id);
        Ok(registro)
    }

    pub async fn list_registros(
        &self,
        user: &CurrentUser,
        property_id: Option<Uuid>,
    ) -> Result<Vec<Registro>, AppError> {
        self.repo.list_registros(user.owner_scope(), property_id).await
    }

    pub async fn get_registro(&self, registro_id: Uuid, user: &CurrentUser) -> Result<Registro, AppError> {
        self.repo
            .find_registro(&self.pool, registro_id, user.owner_scope())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("registro".into()))
    }

    pub async fn update_registro(
        &self,
        registro_id: Uuid,
        payload: &UpdateRegistroPayload,
        user: &CurrentUser,
    ) -> Result<Registro, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = self.repo
            .find_registro(&mut *tx, registro_id, user.owner_scope())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("registro".into()))?;

        if let Some(next) = payload.status {
            ensure_registro_transition(current.status, next)?;
        }

        let registro = self.repo.update_registro(&mut *tx, registro_id, payload).await?;
        tx.commit().await?;

        if registro.status != current.status {
            tracing::info!("Registro {}: {:?} -> {:?}", registro.id, current.status, registro.status);
        }
        Ok(registro)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RegistroStatus::*;

    #[test]
    fn open_registro_can_move_anywhere() {
        for to in [EmPreparacao, Protocolado, EmExigencia, Registrado, Cancelado] {
            assert!(ensure_registro_transition(Protocolado, to).is_ok());
        }
    }

    #[test]
    fn closed_registro_is_frozen() {
        match ensure_registro_transition(Registrado, EmExigencia) {
            Err(AppError::InvalidStateTransition { from, to }) => {
                assert_eq!(from, "REGISTRADO");
                assert_eq!(to, "EM_EXIGENCIA");
            }
            other => panic!("esperava InvalidStateTransition, veio {:?}", other),
        }
        assert!(ensure_registro_transition(Cancelado, Cancelado).is_ok());
    }
}

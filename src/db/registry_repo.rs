// src/db/registry_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::registry::{
        Cartorio, CartorioFilter, CreateCartorioPayload, CreateRegistroPayload, Registro,
        UpdateRegistroPayload,
    },
};

#[derive(Clone)]
pub struct RegistryRepository {
    pool: PgPool,
}

impl RegistryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  CARTÓRIOS
    // =========================================================================

    pub async fn create_cartorio(&self, input: &CreateCartorioPayload) -> Result<Cartorio, AppError> {
        sqlx::query_as::<_, Cartorio>(
            r#"
            INSERT INTO cartorios (name, cns, city, state, address, phone, email)
            VALUES ($1, $2, $3, upper($4), $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.cns)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique(e, |constraint| AppError::UniqueConstraintViolation(constraint.to_string())))
    }

    pub async fn list_cartorios(&self, filter: &CartorioFilter) -> Result<Vec<Cartorio>, AppError> {
        let cartorios = sqlx::query_as::<_, Cartorio>(
            r#"
            SELECT * FROM cartorios
            WHERE ($1::text IS NULL OR city ILIKE $1)
              AND ($2::text IS NULL OR state = upper($2))
            ORDER BY state, city, name
            "#,
        )
        .bind(&filter.city)
        .bind(&filter.state)
        .fetch_all(&self.pool)
        .await?;

        Ok(cartorios)
    }

    pub async fn find_cartorio<'e, E>(&self, executor: E, cartorio_id: Uuid) -> Result<Option<Cartorio>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let cartorio = sqlx::query_as::<_, Cartorio>("SELECT * FROM cartorios WHERE id = $1")
            .bind(cartorio_id)
            .fetch_optional(executor)
            .await?;
        Ok(cartorio)
    }

    // =========================================================================
    //  REGISTROS (escopo pelo dono do imóvel)
    // =========================================================================

    pub async fn create_registro<'e, E>(&self, executor: E, input: &CreateRegistroPayload) -> Result<Registro, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let registro = sqlx::query_as::<_, Registro>(
            r#"
            INSERT INTO registros (
                property_id, cartorio_id, protocol_number, protocol_date, expected_date, fees, notes, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7,
                    CASE WHEN $3::text IS NULL THEN 'EM_PREPARACAO' ELSE 'PROTOCOLADO' END::registro_status)
            RETURNING *
            "#,
        )
        .bind(input.property_id)
        .bind(input.cartorio_id)
        .bind(&input.protocol_number)
        .bind(input.protocol_date)
        .bind(input.expected_date)
        .bind(input.fees)
        .bind(&input.notes)
        .fetch_one(executor)
        .await?;

        Ok(registro)
    }

    pub async fn list_registros(
        &self,
        owner_scope: Option<Uuid>,
        property_id: Option<Uuid>,
    ) -> Result<Vec<Registro>, AppError> {
        let registros = sqlx::query_as::<_, Registro>(
            r#"
            SELECT r.* FROM registros r
            JOIN properties p ON p.id = r.property_id
            WHERE ($1::uuid IS NULL OR p.owner_id = $1)
              AND ($2::uuid IS NULL OR r.property_id = $2)
            ORDER BY r.updated_at DESC
            "#,
        )
        .bind(owner_scope)
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(registros)
    }

    pub async fn find_registro<'e, E>(
        &self,
        executor: E,
        registro_id: Uuid,
        owner_scope: Option<Uuid>,
    ) -> Result<Option<Registro>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let registro = sqlx::query_as::<_, Registro>(
            r#"
            SELECT r.* FROM registros r
            JOIN properties p ON p.id = r.property_id
            WHERE r.id = $1 AND ($2::uuid IS NULL OR p.owner_id = $2)
            "#,
        )
        .bind(registro_id)
        .bind(owner_scope)
        .fetch_optional(executor)
        .await?;

        Ok(registro)
    }

    pub async fn update_registro<'e, E>(
        &self,
        executor: E,
        registro_id: Uuid,
        input: &UpdateRegistroPayload,
    ) -> Result<Registro, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let registro = sqlx::query_as::<_, Registro>(
            r#"
            UPDATE registros SET
                status = COALESCE($2, status),
                protocol_number = COALESCE($3, protocol_number),
                registration_number = COALESCE($4, registration_number),
                protocol_date = COALESCE($5, protocol_date),
                expected_date = COALESCE($6, expected_date),
                completed_date = COALESCE($7, completed_date),
                fees = COALESCE($8, fees),
                notes = COALESCE($9, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(registro_id)
        .bind(input.status)
        .bind(&input.protocol_number)
        .bind(&input.registration_number)
        .bind(input.protocol_date)
        .bind(input.expected_date)
        .bind(input.completed_date)
        .bind(input.fees)
        .bind(&input.notes)
        .fetch_one(executor)
        .await?;

        Ok(registro)
    }
}

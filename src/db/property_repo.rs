// src/db/property_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::property::{CreatePropertyPayload, Property, PropertyStage, UpdatePropertyPayload},
};

// `owner_scope = None` significa acesso de admin (sem filtro de dono)
#[derive(Clone)]
pub struct PropertyRepository {
    pool: PgPool,
}

impl PropertyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        owner_id: Uuid,
        input: &CreatePropertyPayload,
    ) -> Result<Property, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let property = sqlx::query_as::<_, Property>(
            r#"
            INSERT INTO properties (
                owner_id, client_id, cartorio_id, title, street, number, complement,
                neighborhood, city, state, zip_code, value, registration_number, iptu_number,
                status, current_stage
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, upper($10), $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(input.client_id)
        .bind(input.cartorio_id)
        .bind(&input.title)
        .bind(&input.street)
        .bind(&input.number)
        .bind(&input.complement)
        .bind(&input.neighborhood)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zip_code)
        .bind(input.value)
        .bind(&input.registration_number)
        .bind(&input.iptu_number)
        .bind(PropertyStage::Captacao)
        .bind(PropertyStage::Captacao.number())
        .fetch_one(executor)
        .await?;

        Ok(property)
    }

    pub async fn list<'e, E>(&self, executor: E, owner_scope: Option<Uuid>) -> Result<Vec<Property>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let properties = sqlx::query_as::<_, Property>(
            r#"
            SELECT * FROM properties
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            ORDER BY updated_at DESC
            "#,
        )
        .bind(owner_scope)
        .fetch_all(executor)
        .await?;

        Ok(properties)
    }

    pub async fn find<'e, E>(
        &self,
        executor: E,
        property_id: Uuid,
        owner_scope: Option<Uuid>,
    ) -> Result<Option<Property>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let property = sqlx::query_as::<_, Property>(
            "SELECT * FROM properties WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)",
        )
        .bind(property_id)
        .bind(owner_scope)
        .fetch_optional(executor)
        .await?;

        Ok(property)
    }

    // Trava a linha até o fim da transação: avanços concorrentes do mesmo imóvel ficam em fila
    pub async fn find_for_update<'e, E>(
        &self,
        executor: E,
        property_id: Uuid,
        owner_scope: Option<Uuid>,
    ) -> Result<Option<Property>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let property = sqlx::query_as::<_, Property>(
            r#"
            SELECT * FROM properties
            WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)
            FOR UPDATE
            "#,
        )
        .bind(property_id)
        .bind(owner_scope)
        .fetch_optional(executor)
        .await?;

        Ok(property)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        property_id: Uuid,
        owner_scope: Option<Uuid>,
        input: &UpdatePropertyPayload,
    ) -> Result<Option<Property>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties SET
                title = COALESCE($3, title),
                street = COALESCE($4, street),
                number = COALESCE($5, number),
                complement = COALESCE($6, complement),
                neighborhood = COALESCE($7, neighborhood),
                city = COALESCE($8, city),
                state = COALESCE(upper($9), state),
                zip_code = COALESCE($10, zip_code),
                value = COALESCE($11, value),
                registration_number = COALESCE($12, registration_number),
                iptu_number = COALESCE($13, iptu_number),
                client_id = COALESCE($14, client_id),
                cartorio_id = COALESCE($15, cartorio_id),
                updated_at = NOW()
            WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)
            RETURNING *
            "#,
        )
        .bind(property_id)
        .bind(owner_scope)
        .bind(&input.title)
        .bind(&input.street)
        .bind(&input.number)
        .bind(&input.complement)
        .bind(&input.neighborhood)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zip_code)
        .bind(input.value)
        .bind(&input.registration_number)
        .bind(&input.iptu_number)
        .bind(input.client_id)
        .bind(input.cartorio_id)
        .fetch_optional(executor)
        .await?;

        Ok(property)
    }

    // Só o fluxo de avanço chama isto
    pub async fn update_stage<'e, E>(
        &self,
        executor: E,
        property_id: Uuid,
        stage: PropertyStage,
    ) -> Result<Property, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties
            SET current_stage = $2, status = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(property_id)
        .bind(stage.number())
        .bind(stage)
        .fetch_one(executor)
        .await?;

        Ok(property)
    }

    // Exclusão definitiva (admin); requisitos, métricas, logs e registros caem em cascata
    pub async fn delete<'e, E>(&self, executor: E, property_id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(property_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn owner_of(&self, property_id: Uuid) -> Result<Option<Uuid>, AppError> {
        let owner = sqlx::query_scalar::<_, Uuid>("SELECT owner_id FROM properties WHERE id = $1")
            .bind(property_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }
}

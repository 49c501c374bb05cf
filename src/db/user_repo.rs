// src/db/user_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{PartnerKind, User, UserRole},
};

// Dados de um usuário a ser criado (senha já em hash)
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub role: UserRole,
    pub partner_kind: Option<PartnerKind>,
    pub creci: Option<&'a str>,
    pub document_number: Option<&'a str>,
    pub company_name: Option<&'a str>,
    pub created_by: Option<Uuid>,
}

// O repositório de usuários, responsável por todas as interações com a tabela 'users'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Busca um usuário pelo seu e-mail
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let maybe_user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe_user)
    }

    // Busca um usuário pelo seu ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let maybe_user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe_user)
    }

    pub async fn count_by_role(&self, role: UserRole) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // Cria um novo usuário. E-mail duplicado vira EmailAlreadyExists.
    pub async fn create_user<'e, E>(&self, executor: E, new_user: &NewUser<'_>) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                email, password_hash, full_name, role, partner_kind,
                creci, document_number, company_name, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(new_user.email)
        .bind(new_user.password_hash)
        .bind(new_user.full_name)
        .bind(new_user.role)
        .bind(new_user.partner_kind)
        .bind(new_user.creci)
        .bind(new_user.document_number)
        .bind(new_user.company_name)
        .bind(new_user.created_by)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            AppError::from_unique(e, |constraint| match constraint {
                "users_email_key" => AppError::EmailAlreadyExists,
                other => AppError::UniqueConstraintViolation(other.to_string()),
            })
        })
    }

    pub async fn list_by_role<'e, E>(&self, executor: E, role: UserRole) -> Result<Vec<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE role = $1 ORDER BY created_at DESC",
        )
        .bind(role)
        .fetch_all(executor)
        .await?;
        Ok(users)
    }

    pub async fn set_active<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        role: UserRole,
        is_active: bool,
    ) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET is_active = $1, updated_at = NOW()
            WHERE id = $2 AND role = $3
            RETURNING *
            "#,
        )
        .bind(is_active)
        .bind(user_id)
        .bind(role)
        .fetch_optional(executor)
        .await?;
        Ok(user)
    }
}

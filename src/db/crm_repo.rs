// src/db/crm_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::crm::{
        Client, ClientNote, ClientType, CreateClientPayload, CreateNotePayload, NoteAuditEntry,
        NoteChange, NotePriority, NoteType, UpdateClientPayload,
    },
};

// Estado final de uma anotação, já resolvido pelo serviço
#[derive(Debug, Clone)]
pub struct NoteRow<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub note_type: NoteType,
    pub priority: NotePriority,
    pub status: crate::models::crm::NoteStatus,
    pub is_completed: bool,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub reminder_date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Clone)]
pub struct CrmRepository {
    pool: PgPool,
}

impl CrmRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  CLIENTES
    // =========================================================================

    pub async fn create_client<'e, E>(
        &self,
        executor: E,
        owner_id: Uuid,
        input: &CreateClientPayload,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (owner_id, full_name, email, phone, document_number, client_type, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&input.full_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.document_number)
        .bind(input.client_type.unwrap_or(ClientType::Buyer))
        .bind(&input.notes)
        .fetch_one(executor)
        .await?;

        Ok(client)
    }

    pub async fn list_clients(&self, owner_scope: Option<Uuid>) -> Result<Vec<Client>, AppError> {
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            ORDER BY full_name
            "#,
        )
        .bind(owner_scope)
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    pub async fn find_client<'e, E>(
        &self,
        executor: E,
        client_id: Uuid,
        owner_scope: Option<Uuid>,
    ) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)",
        )
        .bind(client_id)
        .bind(owner_scope)
        .fetch_optional(executor)
        .await?;

        Ok(client)
    }

    pub async fn update_client(
        &self,
        client_id: Uuid,
        owner_scope: Option<Uuid>,
        input: &UpdateClientPayload,
    ) -> Result<Option<Client>, AppError> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET
                full_name = COALESCE($3, full_name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                document_number = COALESCE($6, document_number),
                client_type = COALESCE($7, client_type),
                notes = COALESCE($8, notes),
                updated_at = NOW()
            WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)
            RETURNING *
            "#,
        )
        .bind(client_id)
        .bind(owner_scope)
        .bind(&input.full_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.document_number)
        .bind(input.client_type)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    pub async fn delete_client(&self, client_id: Uuid, owner_scope: Option<Uuid>) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)")
            .bind(client_id)
            .bind(owner_scope)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    //  ANOTAÇÕES
    // =========================================================================

    pub async fn create_note<'e, E>(
        &self,
        executor: E,
        client_id: Uuid,
        author_id: Uuid,
        input: &CreateNotePayload,
    ) -> Result<ClientNote, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let note = sqlx::query_as::<_, ClientNote>(
            r#"
            INSERT INTO client_notes (client_id, author_id, title, content, note_type, priority, reminder_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(client_id)
        .bind(author_id)
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.note_type.unwrap_or(NoteType::Note))
        .bind(input.priority.unwrap_or(NotePriority::Medium))
        .bind(input.reminder_date)
        .fetch_one(executor)
        .await?;

        Ok(note)
    }

    pub async fn list_notes(&self, client_id: Uuid) -> Result<Vec<ClientNote>, AppError> {
        let notes = sqlx::query_as::<_, ClientNote>(
            "SELECT * FROM client_notes WHERE client_id = $1 ORDER BY created_at DESC",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notes)
    }

    /// Busca a anotação (com trava) desde que o cliente dela esteja no escopo do usuário
    pub async fn find_note_for_update<'e, E>(
        &self,
        executor: E,
        note_id: Uuid,
        owner_scope: Option<Uuid>,
    ) -> Result<Option<ClientNote>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let note = sqlx::query_as::<_, ClientNote>(
            r#"
            SELECT n.* FROM client_notes n
            JOIN clients c ON c.id = n.client_id
            WHERE n.id = $1 AND ($2::uuid IS NULL OR c.owner_id = $2)
            FOR UPDATE OF n
            "#,
        )
        .bind(note_id)
        .bind(owner_scope)
        .fetch_optional(executor)
        .await?;

        Ok(note)
    }

    pub async fn note_in_scope(&self, note_id: Uuid, owner_scope: Option<Uuid>) -> Result<bool, AppError> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM client_notes n
                JOIN clients c ON c.id = n.client_id
                WHERE n.id = $1 AND ($2::uuid IS NULL OR c.owner_id = $2)
            )
            "#,
        )
        .bind(note_id)
        .bind(owner_scope)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    pub async fn save_note<'e, E>(&self, executor: E, note_id: Uuid, row: &NoteRow<'_>) -> Result<ClientNote, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let note = sqlx::query_as::<_, ClientNote>(
            r#"
            UPDATE client_notes SET
                title = $2, content = $3, note_type = $4, priority = $5, status = $6,
                is_completed = $7, completed_at = $8, reminder_date = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(note_id)
        .bind(row.title)
        .bind(row.content)
        .bind(row.note_type)
        .bind(row.priority)
        .bind(row.status)
        .bind(row.is_completed)
        .bind(row.completed_at)
        .bind(row.reminder_date)
        .fetch_one(executor)
        .await?;

        Ok(note)
    }

    pub async fn delete_note<'e, E>(&self, executor: E, note_id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM client_notes WHERE id = $1")
            .bind(note_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    //  AUDITORIA DAS ANOTAÇÕES (somente inserção)
    // =========================================================================

    pub async fn insert_audit<'e, E>(
        &self,
        executor: E,
        note_id: Uuid,
        actor_id: Uuid,
        change: &NoteChange,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO client_note_audit_logs (note_id, actor_id, action, field, old_value, new_value)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(note_id)
        .bind(actor_id)
        .bind(change.action)
        .bind(change.field)
        .bind(&change.old_value)
        .bind(&change.new_value)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn list_audit(&self, note_id: Uuid) -> Result<Vec<NoteAuditEntry>, AppError> {
        let entries = sqlx::query_as::<_, NoteAuditEntry>(
            "SELECT * FROM client_note_audit_logs WHERE note_id = $1 ORDER BY created_at, id",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

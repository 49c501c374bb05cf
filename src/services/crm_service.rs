// src/services/crm_service.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{crm_repo::NoteRow, CrmRepository, NotificationRepository},
    models::{
        auth::CurrentUser,
        crm::{
            Client, ClientNote, CreateClientPayload, CreateNotePayload, NoteAuditEntry, NoteChange,
            NoteStatus, UpdateClientPayload, UpdateNotePayload,
        },
    },
};

// =========================================================================
//  REGRAS PURAS (diff de auditoria e lembretes)
// =========================================================================

/// O que fazer com o agendamento de lembrete depois de uma mudança na anotação.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAction {
    Keep,
    Schedule(DateTime<Utc>),
    Reschedule(DateTime<Utc>),
    Cancel,
}

/// Estado do lembrete antes e depois de uma alteração na anotação.
#[derive(Debug, Clone, Copy)]
pub struct ReminderChange {
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
    pub was_open: bool,
    pub is_open: bool,
    pub has_active_schedule: bool,
}

/// Reabrir uma anotação sem agendamento ativo agenda de novo o lembrete, desde que a data ainda
/// esteja no futuro. Uma data passada já foi entregue ou perdeu o sentido.
pub fn reminder_action(change: &ReminderChange, now: DateTime<Utc>) -> ReminderAction {
    let date_changed = change.before != change.after;
    let reopened = !change.was_open && change.is_open;

    match (change.after, change.is_open, change.has_active_schedule) {
        (None, _, true) | (Some(_), false, true) => ReminderAction::Cancel,
        (None, _, false) | (Some(_), false, false) => ReminderAction::Keep,
        (Some(at), true, true) if date_changed => ReminderAction::Reschedule(at),
        (Some(_), true, true) => ReminderAction::Keep,
        (Some(at), true, false) if date_changed => ReminderAction::Schedule(at),
        (Some(at), true, false) if reopened && at > now => ReminderAction::Schedule(at),
        (Some(_), true, false) => ReminderAction::Keep,
    }
}

/// Aplica o payload sobre a anotação atual e devolve como ela vai ficar.
/// Conclusão e status andam juntos: concluir marca DONE e reabrir volta para OPEN.
pub fn apply_note_update(current: &ClientNote, payload: &UpdateNotePayload, now: DateTime<Utc>) -> ClientNote {
    let mut next = current.clone();

    if let Some(title) = &payload.title {
        next.title = title.clone();
    }
    if let Some(content) = &payload.content {
        next.content = content.clone();
    }
    if let Some(note_type) = payload.note_type {
        next.note_type = note_type;
    }
    if let Some(priority) = payload.priority {
        next.priority = priority;
    }
    if let Some(status) = payload.status {
        next.status = status;
    }

    // `isCompleted` manda no status: concluída é sempre DONE, e DONE sem conclusão volta para OPEN
    let completed = match (payload.is_completed, payload.status) {
        (Some(flag), _) => flag,
        (None, Some(status)) => status == NoteStatus::Done,
        (None, None) => current.is_completed,
    };
    next.is_completed = completed;

    if completed {
        next.status = NoteStatus::Done;
        next.completed_at = if current.is_completed { current.completed_at } else { Some(now) };
    } else {
        next.completed_at = None;
        if next.status == NoteStatus::Done {
            next.status = NoteStatus::Open;
        }
    }

    if payload.clear_reminder {
        next.reminder_date = None;
    } else if let Some(reminder) = payload.reminder_date {
        next.reminder_date = Some(reminder);
    }

    next
}

fn label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => String::new(),
    }
}

fn date_label(value: &Option<DateTime<Utc>>) -> Option<String> {
    value.map(|d| d.to_rfc3339())
}

fn changed(field: &'static str, old: Option<String>, new: Option<String>, out: &mut Vec<NoteChange>) {
    if old != new {
        out.push(NoteChange { action: "updated", field: Some(field), old_value: old, new_value: new });
    }
}

/// Uma linha por campo alterado, mais um `completed` sintético quando a anotação é concluída.
pub fn diff_notes(before: &ClientNote, after: &ClientNote) -> Vec<NoteChange> {
    let mut changes = Vec::new();

    changed("title", Some(before.title.clone()), Some(after.title.clone()), &mut changes);
    changed("content", Some(before.content.clone()), Some(after.content.clone()), &mut changes);
    changed("noteType", Some(label(&before.note_type)), Some(label(&after.note_type)), &mut changes);
    changed("priority", Some(label(&before.priority)), Some(label(&after.priority)), &mut changes);
    changed("status", Some(label(&before.status)), Some(label(&after.status)), &mut changes);
    changed(
        "isCompleted",
        Some(before.is_completed.to_string()),
        Some(after.is_completed.to_string()),
        &mut changes,
    );
    changed("reminderDate", date_label(&before.reminder_date), date_label(&after.reminder_date), &mut changes);

    if after.is_completed && !before.is_completed {
        changes.push(NoteChange {
            action: "completed",
            field: None,
            old_value: None,
            new_value: date_label(&after.completed_at),
        });
    }

    changes
}

fn reminder_text(note: &ClientNote) -> (String, String) {
    let title = format!("Lembrete: {}", note.title);
    let message = if note.content.trim().is_empty() {
        note.title.clone()
    } else {
        note.content.clone()
    };
    (title, message)
}

fn is_open(note: &ClientNote) -> bool {
    !note.is_completed && note.status != NoteStatus::Cancelled
}

// =========================================================================
//  SERVIÇO
// =========================================================================

#[derive(Clone)]
pub struct CrmService {
    repo: CrmRepository,
    notification_repo: NotificationRepository,
    pool: PgPool,
}

impl CrmService {
    pub fn new(repo: CrmRepository, notification_repo: NotificationRepository, pool: PgPool) -> Self {
        Self { repo, notification_repo, pool }
    }

    // --- Clientes ---

    pub async fn create_client(&self, payload: &CreateClientPayload, user: &CurrentUser) -> Result<Client, AppError> {
        let client = self.repo.create_client(&self.pool, user.id, payload).await?;
        tracing::info!("Cliente {} cadastrado por {}", client.id, user.id);
        Ok(client)
    }

    pub async fn list_clients(&self, user: &CurrentUser) -> Result<Vec<Client>, AppError> {
        self.repo.list_clients(user.owner_scope()).await
    }

    pub async fn get_client(&self, client_id: Uuid, user: &CurrentUser) -> Result<Client, AppError> {
        self.repo
            .find_client(&self.pool, client_id, user.owner_scope())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("client".into()))
    }

    pub async fn update_client(
        &self,
        client_id: Uuid,
        payload: &UpdateClientPayload,
        user: &CurrentUser,
    ) -> Result<Client, AppError> {
        self.repo
            .update_client(client_id, user.owner_scope(), payload)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("client".into()))
    }

    pub async fn delete_client(&self, client_id: Uuid, user: &CurrentUser) -> Result<(), AppError> {
        if !self.repo.delete_client(client_id, user.owner_scope()).await? {
            return Err(AppError::ResourceNotFound("client".into()));
        }
        tracing::info!("Cliente {} excluído por {}", client_id, user.id);
        Ok(())
    }

    // --- Anotações ---

    /// Cria a anotação, o registro `created` e, se houver data de lembrete, o agendamento.
    pub async fn create_note(
        &self,
        client_id: Uuid,
        payload: &CreateNotePayload,
        user: &CurrentUser,
    ) -> Result<ClientNote, AppError> {
        let mut tx = self.pool.begin().await?;

        self.repo
            .find_client(&mut *tx, client_id, user.owner_scope())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("client".into()))?;

        let note = self.repo.create_note(&mut *tx, client_id, user.id, payload).await?;

        self.repo
            .insert_audit(
                &mut *tx,
                note.id,
                user.id,
                &NoteChange { action: "created", field: None, old_value: None, new_value: Some(note.title.clone()) },
            )
            .await?;

        if let Some(reminder_date) = note.reminder_date {
            let (title, message) = reminder_text(&note);
            let scheduled = self.notification_repo
                .insert_scheduled(&mut *tx, note.author_id, Some(note.id), &title, &message, reminder_date)
                .await?;
            tracing::info!("⏰ Lembrete {} agendado para {}", scheduled.id, reminder_date);
        }

        tx.commit().await?;
        Ok(note)
    }

    pub async fn list_notes(&self, client_id: Uuid, user: &CurrentUser) -> Result<Vec<ClientNote>, AppError> {
        self.get_client(client_id, user).await?;
        self.repo.list_notes(client_id).await
    }

    /// Grava a anotação, uma linha de auditoria por campo alterado e ajusta o lembrete.
    pub async fn update_note(
        &self,
        note_id: Uuid,
        payload: &UpdateNotePayload,
        user: &CurrentUser,
    ) -> Result<ClientNote, AppError> {
        let mut tx = self.pool.begin().await?;

        let before = self.repo
            .find_note_for_update(&mut *tx, note_id, user.owner_scope())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("note".into()))?;

        let projected = apply_note_update(&before, payload, Utc::now());
        let changes = diff_notes(&before, &projected);
        if changes.is_empty() {
            tx.commit().await?;
            return Ok(before);
        }

        let saved = self.repo
            .save_note(
                &mut *tx,
                note_id,
                &NoteRow {
                    title: &projected.title,
                    content: &projected.content,
                    note_type: projected.note_type,
                    priority: projected.priority,
                    status: projected.status,
                    is_completed: projected.is_completed,
                    completed_at: projected.completed_at,
                    reminder_date: projected.reminder_date,
                },
            )
            .await?;

        for change in &changes {
            self.repo.insert_audit(&mut *tx, note_id, user.id, change).await?;
        }

        let active = self.notification_repo.find_active_for_note(&mut *tx, note_id).await?;
        let action = reminder_action(
            &ReminderChange {
                before: before.reminder_date,
                after: saved.reminder_date,
                was_open: is_open(&before),
                is_open: is_open(&saved),
                has_active_schedule: active.is_some(),
            },
            Utc::now(),
        );
        let (title, message) = reminder_text(&saved);
        match (action, active) {
            (ReminderAction::Schedule(at), _) => {
                self.notification_repo
                    .insert_scheduled(&mut *tx, saved.author_id, Some(note_id), &title, &message, at)
                    .await?;
            }
            (ReminderAction::Reschedule(at), Some(scheduled)) => {
                self.notification_repo
                    .reschedule(&mut *tx, scheduled.id, at, &title, &message)
                    .await?;
            }
            (ReminderAction::Cancel, Some(_)) => {
                self.notification_repo.cancel_active_for_note(&mut *tx, note_id).await?;
            }
            _ => {}
        }

        tx.commit().await?;

        tracing::info!("Anotação {} alterada por {} ({} mudança(s), lembrete {:?})", note_id, user.id, changes.len(), action);
        Ok(saved)
    }

    pub async fn delete_note(&self, note_id: Uuid, user: &CurrentUser) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        self.repo
            .find_note_for_update(&mut *tx, note_id, user.owner_scope())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("note".into()))?;

        let cancelled = self.notification_repo.cancel_active_for_note(&mut *tx, note_id).await?;
        self.repo.delete_note(&mut *tx, note_id).await?;

        tx.commit().await?;
        tracing::info!("Anotação {} excluída por {} ({} lembrete(s) cancelado(s))", note_id, user.id, cancelled);
        Ok(())
    }

    pub async fn note_audit(&self, note_id: Uuid, user: &CurrentUser) -> Result<Vec<NoteAuditEntry>, AppError> {
        if !self.repo.note_in_scope(note_id, user.owner_scope()).await? {
            return Err(AppError::ResourceNotFound("note".into()));
        }
        self.repo.list_audit(note_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::crm::{NotePriority, NoteType};
    use chrono::TimeZone;

    fn note() -> ClientNote {
        let created = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        ClientNote {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            title: "Ligar para a cliente".into(),
            content: "Confirmar visita de sábado".into(),
            note_type: NoteType::Call,
            priority: NotePriority::Medium,
            status: NoteStatus::Open,
            is_completed: false,
            completed_at: None,
            reminder_date: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 11, 14, 30, 0).unwrap()
    }

    #[test]
    fn one_row_per_changed_field() {
        let before = note();
        let payload = UpdateNotePayload {
            title: Some("Ligar para a Maria".into()),
            priority: Some(NotePriority::High),
            content: Some(before.content.clone()),
            ..Default::default()
        };

        let after = apply_note_update(&before, &payload, now());
        let changes = diff_notes(&before, &after);

        let fields: Vec<_> = changes.iter().map(|c| c.field).collect();
        assert_eq!(fields, vec![Some("title"), Some("priority")]);
        assert_eq!(changes[1].old_value.as_deref(), Some("MEDIUM"));
        assert_eq!(changes[1].new_value.as_deref(), Some("HIGH"));
        assert!(changes.iter().all(|c| c.action == "updated"));
    }

    #[test]
    fn completing_adds_synthetic_completed_entry() {
        let before = note();
        let payload = UpdateNotePayload { is_completed: Some(true), ..Default::default() };

        let after = apply_note_update(&before, &payload, now());
        let changes = diff_notes(&before, &after);

        assert_eq!(after.status, NoteStatus::Done);
        assert_eq!(after.completed_at, Some(now()));
        let last = changes.last().unwrap();
        assert_eq!(last.action, "completed");
        assert_eq!(last.field, None);
        assert!(changes.iter().any(|c| c.field == Some("status")));
        assert!(changes.iter().any(|c| c.field == Some("isCompleted")));
    }

    #[test]
    fn reopening_clears_completion_without_synthetic_entry() {
        let mut before = note();
        before.is_completed = true;
        before.status = NoteStatus::Done;
        before.completed_at = Some(now());

        let after = apply_note_update(&before, &UpdateNotePayload { is_completed: Some(false), ..Default::default() }, now());
        let changes = diff_notes(&before, &after);

        assert_eq!(after.status, NoteStatus::Open);
        assert_eq!(after.completed_at, None);
        assert!(changes.iter().all(|c| c.action != "completed"));
    }

    #[test]
    fn no_changes_means_no_audit_rows() {
        let before = note();
        let after = apply_note_update(&before, &UpdateNotePayload::default(), now());
        assert!(diff_notes(&before, &after).is_empty());
    }

    fn change(
        before: Option<DateTime<Utc>>,
        after: Option<DateTime<Utc>>,
        was_open: bool,
        is_open: bool,
        has_active_schedule: bool,
    ) -> ReminderChange {
        ReminderChange { before, after, was_open, is_open, has_active_schedule }
    }

    #[test]
    fn reminder_changes_drive_the_schedule() {
        let at = now() + chrono::Duration::days(1);
        let later = at + chrono::Duration::hours(2);

        assert_eq!(reminder_action(&change(None, Some(at), true, true, false), now()), ReminderAction::Schedule(at));
        assert_eq!(reminder_action(&change(Some(at), Some(later), true, true, true), now()), ReminderAction::Reschedule(later));
        assert_eq!(reminder_action(&change(Some(at), Some(at), true, true, true), now()), ReminderAction::Keep);
        assert_eq!(reminder_action(&change(Some(at), None, true, true, true), now()), ReminderAction::Cancel);
        assert_eq!(reminder_action(&change(None, None, true, true, false), now()), ReminderAction::Keep);
    }

    #[test]
    fn closing_a_note_cancels_its_reminder() {
        let at = now() + chrono::Duration::days(1);
        assert_eq!(reminder_action(&change(Some(at), Some(at), true, false, true), now()), ReminderAction::Cancel);
        assert_eq!(reminder_action(&change(None, Some(at), true, false, false), now()), ReminderAction::Keep);
    }

    #[test]
    fn reopening_a_note_schedules_its_future_reminder_again() {
        let at = now() + chrono::Duration::days(1);

        assert_eq!(reminder_action(&change(Some(at), Some(at), false, true, false), now()), ReminderAction::Schedule(at));
        // Já havia agendamento vivo: nada a fazer
        assert_eq!(reminder_action(&change(Some(at), Some(at), false, true, true), now()), ReminderAction::Keep);
    }

    #[test]
    fn reopening_a_note_with_past_reminder_does_not_schedule() {
        let past = now() - chrono::Duration::hours(3);
        assert_eq!(reminder_action(&change(Some(past), Some(past), false, true, false), now()), ReminderAction::Keep);
    }

    #[test]
    fn editing_an_open_note_does_not_resend_a_delivered_reminder() {
        let at = now() + chrono::Duration::days(1);
        assert_eq!(reminder_action(&change(Some(at), Some(at), true, true, false), now()), ReminderAction::Keep);
    }

    #[test]
    fn completion_flag_wins_over_conflicting_status() {
        let before = note();
        let payload = UpdateNotePayload {
            is_completed: Some(true),
            status: Some(NoteStatus::Open),
            ..Default::default()
        };

        let after = apply_note_update(&before, &payload, now());

        assert!(after.is_completed);
        assert_eq!(after.status, NoteStatus::Done);
        assert_eq!(after.completed_at, Some(now()));
    }

    #[test]
    fn reopening_with_done_status_falls_back_to_open() {
        let mut before = note();
        before.is_completed = true;
        before.status = NoteStatus::Done;
        before.completed_at = Some(now());

        let payload = UpdateNotePayload {
            is_completed: Some(false),
            status: Some(NoteStatus::Done),
            ..Default::default()
        };
        let after = apply_note_update(&before, &payload, now());

        assert!(!after.is_completed);
        assert_eq!(after.status, NoteStatus::Open);
        assert_eq!(after.completed_at, None);
    }

    #[test]
    fn cancelling_a_completed_note_reopens_completion() {
        let mut before = note();
        before.is_completed = true;
        before.status = NoteStatus::Done;
        before.completed_at = Some(now());

        let payload = UpdateNotePayload { status: Some(NoteStatus::Cancelled), ..Default::default() };
        let after = apply_note_update(&before, &payload, now());

        assert!(!after.is_completed);
        assert_eq!(after.status, NoteStatus::Cancelled);
        assert!(!is_open(&after));
    }

    #[test]
    fn clearing_reminder_is_audited() {
        let mut before = note();
        before.reminder_date = Some(now());

        let after = apply_note_update(&before, &UpdateNotePayload { clear_reminder: true, ..Default::default() }, now());
        let changes = diff_notes(&before, &after);

        assert_eq!(after.reminder_date, None);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, Some("reminderDate"));
        assert_eq!(changes[0].new_value, None);
    }

    #[test]
    fn reminder_text_falls_back_to_title() {
        let mut n = note();
        n.content = "  ".into();
        let (title, message) = reminder_text(&n);
        assert_eq!(title, "Lembrete: Ligar para a cliente");
        assert_eq!(message, "Ligar para a cliente");
    }
}

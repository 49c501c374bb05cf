// tests/pendency_flow.rs
//
// Fluxos completos contra Postgres. Rodam com DATABASE_URL apontando para um
// servidor de teste: `cargo test -- --ignored`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::PgPool;

use corretora_backend::{
    common::error::AppError,
    config::{AppState, Config},
    models::{
        auth::{CreateAgentPayload, CurrentUser, UserRole},
        crm::{Client, ClientNote, CreateClientPayload, CreateNotePayload, UpdateNotePayload},
        notification::{NotificationKind, ScheduledNotification, ScheduledStatus},
        pendency::{AdvancementOutcome, RequirementPriority, RequirementStatus, UpdateRequirementPayload},
        property::{AdvanceStagePayload, CreatePropertyPayload, Property},
    },
};

struct Ctx {
    state: AppState,
    agent: CurrentUser,
}

async fn setup(pool: PgPool) -> Ctx {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://gerenciado-pelo-sqlx-test".to_string()),
        "JWT_SECRET" => Some("segredo-de-teste".to_string()),
        _ => None,
    })
    .unwrap();
    let state = AppState::from_pool(pool, config);

    state.auth_service.ensure_bootstrap_admin("admin@teste.com.br", "senha-forte-123").await.unwrap();
    let token = state.auth_service.login_user("admin@teste.com.br", "senha-forte-123").await.unwrap();
    let admin = state.auth_service.validate_token(&token).unwrap();

    let agent = state
        .auth_service
        .create_agent(
            admin.id,
            &CreateAgentPayload {
                email: "corretor@teste.com.br".into(),
                password: "senha-do-corretor".into(),
                full_name: "Corretor de Teste".into(),
                creci: None,
            },
        )
        .await
        .unwrap();

    Ctx {
        agent: CurrentUser { id: agent.id, email: agent.email.clone(), role: UserRole::Agent },
        state,
    }
}

async fn new_property(ctx: &Ctx) -> Property {
    ctx.state
        .property_service
        .create(
            &CreatePropertyPayload {
                title: "Apartamento 2 dormitórios".into(),
                street: "Rua Augusta".into(),
                number: Some("100".into()),
                complement: None,
                neighborhood: None,
                city: "São Paulo".into(),
                state: "SP".into(),
                zip_code: None,
                value: None,
                registration_number: None,
                iptu_number: None,
                client_id: None,
                cartorio_id: None,
                owner_id: None,
            },
            &ctx.agent,
        )
        .await
        .unwrap()
}

fn advance_to(stage: i32, force: bool) -> AdvanceStagePayload {
    AdvanceStagePayload { target_stage: stage, force, reason: None }
}

async fn new_client(ctx: &Ctx, name: &str) -> Client {
    ctx.state
        .crm_service
        .create_client(
            &CreateClientPayload {
                full_name: name.into(),
                email: None,
                phone: None,
                document_number: None,
                client_type: None,
                notes: None,
            },
            &ctx.agent,
        )
        .await
        .unwrap()
}

async fn note_with_reminder(ctx: &Ctx, client: &Client, title: &str, reminder: DateTime<Utc>) -> ClientNote {
    ctx.state
        .crm_service
        .create_note(
            client.id,
            &CreateNotePayload {
                title: title.into(),
                content: String::new(),
                note_type: None,
                priority: None,
                reminder_date: Some(reminder),
            },
            &ctx.agent,
        )
        .await
        .unwrap()
}

async fn scheduled_with(ctx: &Ctx, status: ScheduledStatus) -> Vec<ScheduledNotification> {
    ctx.state.notification_service.list_scheduled(&ctx.agent, Some(status)).await.unwrap()
}

async fn reminder_count(ctx: &Ctx) -> usize {
    let inbox = ctx.state.notification_service.list(&ctx.agent, false).await.unwrap();
    inbox.iter().filter(|n| n.kind == NotificationKind::Reminder).count()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn new_property_starts_at_captacao_with_all_metrics(pool: PgPool) {
    let ctx = setup(pool).await;
    let property = new_property(&ctx).await;

    assert_eq!(property.current_stage, 1);
    let metrics = ctx.state.pendency_service.list_metrics(property.id, &ctx.agent).await.unwrap();
    assert_eq!(metrics.len(), 8);
    assert!(metrics.iter().all(|m| m.completed_count == 0 && m.total_count > 0));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn critical_pendency_blocks_until_forced(pool: PgPool) {
    let ctx = setup(pool).await;
    let property = new_property(&ctx).await;

    // Pula a captação forçando; a etapa 1 tem pendência crítica
    let jumped = ctx.state.advancement_service.advance(property.id, advance_to(3, true), &ctx.agent).await.unwrap();
    assert_eq!(jumped.property.current_stage, 3);
    assert_eq!(jumped.advancement_log.outcome, AdvancementOutcome::Overridden);

    let report = ctx.state.pendency_service.validate(property.id, &ctx.agent).await.unwrap();
    assert_eq!(report.stage, 3);
    assert!(!report.can_advance);
    assert_eq!(report.critical_pending_count, 1);

    let blocked = ctx.state.advancement_service.advance(property.id, advance_to(4, false), &ctx.agent).await;
    match blocked {
        Err(AppError::PendenciesOutstanding(items)) => {
            assert_eq!(items.len(), 1);
            assert!(items.iter().all(|i| i.priority == RequirementPriority::Critical && i.stage == 3));
        }
        other => panic!("esperava bloqueio, veio {:?}", other.map(|r| r.property.current_stage)),
    }

    let still = ctx.state.property_service.get(property.id, &ctx.agent).await.unwrap();
    assert_eq!(still.current_stage, 3);

    let forced = ctx.state.advancement_service.advance(property.id, advance_to(4, true), &ctx.agent).await.unwrap();
    assert_eq!(forced.property.current_stage, 4);
    assert!(forced.advancement_log.overridden);
    assert_eq!(forced.advancement_log.critical_pending_count, 1);

    let logs = ctx.state.pendency_service.list_advancement_logs(property.id, &ctx.agent).await.unwrap();
    let count = |o: AdvancementOutcome| logs.iter().filter(|l| l.outcome == o).count();
    assert_eq!(logs.len(), 3);
    assert_eq!(count(AdvancementOutcome::Blocked), 1);
    assert_eq!(count(AdvancementOutcome::Overridden), 2);

    // Só os avanços efetivos notificam o dono
    let events = ctx.state.pendency_service.list_pendency_notifications(&ctx.agent).await.unwrap();
    assert_eq!(events.len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn completing_the_critical_item_unblocks_and_updates_metric(pool: PgPool) {
    let ctx = setup(pool).await;
    let property = new_property(&ctx).await;
    ctx.state.advancement_service.advance(property.id, advance_to(3, true), &ctx.agent).await.unwrap();

    let items = ctx.state.pendency_service.list_requirements(property.id, Some(3), &ctx.agent).await.unwrap();
    let critical = items.iter().find(|i| i.priority == RequirementPriority::Critical).unwrap();

    let updated = ctx
        .state
        .pendency_service
        .update_requirement(
            property.id,
            critical.id,
            &UpdateRequirementPayload { status: RequirementStatus::Completed, ..Default::default() },
            &ctx.agent,
        )
        .await
        .unwrap();

    assert_eq!(updated.requirement.completed_by, Some(ctx.agent.id));
    assert_eq!((updated.metric.completed_count, updated.metric.total_count), (1, 4));
    assert_eq!(updated.metric.completion_percentage, 25);

    let moved = ctx.state.advancement_service.advance(property.id, advance_to(4, false), &ctx.agent).await.unwrap();
    assert_eq!(moved.advancement_log.outcome, AdvancementOutcome::Allowed);
    assert!(!moved.advancement_log.overridden);
    assert_eq!(moved.advancement_log.pending_count, 3);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn blocked_requirement_alerts_the_owner(pool: PgPool) {
    let ctx = setup(pool).await;
    let property = new_property(&ctx).await;

    let items = ctx.state.pendency_service.list_requirements(property.id, Some(1), &ctx.agent).await.unwrap();
    ctx.state
        .pendency_service
        .update_requirement(
            property.id,
            items[0].id,
            &UpdateRequirementPayload { status: RequirementStatus::Blocked, ..Default::default() },
            &ctx.agent,
        )
        .await
        .unwrap();

    let inbox = ctx.state.notification_service.list(&ctx.agent, true).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::PendencyAlert);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn advancing_to_the_current_stage_is_logged_without_notification(pool: PgPool) {
    let ctx = setup(pool).await;
    let property = new_property(&ctx).await;

    let same = ctx.state.advancement_service.advance(property.id, advance_to(1, false), &ctx.agent).await.unwrap();
    assert_eq!(same.property.current_stage, 1);
    assert_eq!(same.advancement_log.outcome, AdvancementOutcome::Allowed);

    let logs = ctx.state.pendency_service.list_advancement_logs(property.id, &ctx.agent).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!(ctx.state.pendency_service.list_pendency_notifications(&ctx.agent).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn moving_back_with_critical_pendency_is_blocked(pool: PgPool) {
    let ctx = setup(pool).await;
    let property = new_property(&ctx).await;
    ctx.state.advancement_service.advance(property.id, advance_to(3, true), &ctx.agent).await.unwrap();

    let back = ctx.state.advancement_service.advance(property.id, advance_to(2, false), &ctx.agent).await;
    assert!(matches!(back, Err(AppError::PendenciesOutstanding(ref items)) if items.len() == 1));

    let still = ctx.state.property_service.get(property.id, &ctx.agent).await.unwrap();
    assert_eq!(still.current_stage, 3);

    let logs = ctx.state.pendency_service.list_advancement_logs(property.id, &ctx.agent).await.unwrap();
    let blocked: Vec<_> = logs.iter().filter(|l| l.outcome == AdvancementOutcome::Blocked).collect();
    assert_eq!(blocked.len(), 1);
    assert_eq!((blocked[0].from_stage, blocked[0].to_stage), (3, 2));

    let forced = ctx.state.advancement_service.advance(property.id, advance_to(2, true), &ctx.agent).await.unwrap();
    assert_eq!(forced.property.current_stage, 2);
    assert_eq!(forced.advancement_log.outcome, AdvancementOutcome::Overridden);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn requirement_fields_can_be_set_and_cleared(pool: PgPool) {
    let ctx = setup(pool).await;
    let property = new_property(&ctx).await;
    let items = ctx.state.pendency_service.list_requirements(property.id, Some(1), &ctx.agent).await.unwrap();
    let due = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

    let set = ctx
        .state
        .pendency_service
        .update_requirement(
            property.id,
            items[0].id,
            &UpdateRequirementPayload {
                status: RequirementStatus::InProgress,
                due_date: Some(due),
                assigned_to: Some(ctx.agent.id),
                notes: Some("Aguardando matrícula atualizada".into()),
                ..Default::default()
            },
            &ctx.agent,
        )
        .await
        .unwrap();
    assert_eq!(set.requirement.due_date, Some(due));
    assert_eq!(set.requirement.assigned_to, Some(ctx.agent.id));

    // Campos ausentes preservam o que já estava gravado
    let kept = ctx
        .state
        .pendency_service
        .update_requirement(
            property.id,
            items[0].id,
            &UpdateRequirementPayload { status: RequirementStatus::InProgress, ..Default::default() },
            &ctx.agent,
        )
        .await
        .unwrap();
    assert_eq!(kept.requirement.notes.as_deref(), Some("Aguardando matrícula atualizada"));

    let cleared = ctx
        .state
        .pendency_service
        .update_requirement(
            property.id,
            items[0].id,
            &UpdateRequirementPayload {
                status: RequirementStatus::InProgress,
                clear_due_date: true,
                clear_assigned_to: true,
                clear_notes: true,
                ..Default::default()
            },
            &ctx.agent,
        )
        .await
        .unwrap();
    assert_eq!(cleared.requirement.due_date, None);
    assert_eq!(cleared.requirement.assigned_to, None);
    assert_eq!(cleared.requirement.notes, None);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn note_reminder_is_delivered_exactly_once(pool: PgPool) {
    let ctx = setup(pool).await;

    let client = ctx
        .state
        .crm_service
        .create_client(
            &CreateClientPayload {
                full_name: "Maria da Silva".into(),
                email: None,
                phone: None,
                document_number: None,
                client_type: None,
                notes: None,
            },
            &ctx.agent,
        )
        .await
        .unwrap();

    let reminder = Utc::now() - Duration::minutes(1);
    let note = ctx
        .state
        .crm_service
        .create_note(
            client.id,
            &CreateNotePayload {
                title: "Ligar sobre a proposta".into(),
                content: String::new(),
                note_type: None,
                priority: None,
                reminder_date: Some(reminder),
            },
            &ctx.agent,
        )
        .await
        .unwrap();

    let pending = ctx
        .state
        .notification_service
        .list_scheduled(&ctx.agent, Some(ScheduledStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    // Postgres guarda microssegundos
    assert_eq!(pending[0].scheduled_for.timestamp_micros(), reminder.timestamp_micros());

    let first = ctx.state.notification_scheduler.run_sweep_once().await.unwrap();
    assert_eq!((first.picked, first.sent, first.failed), (1, 1, 0));

    let second = ctx.state.notification_scheduler.run_sweep_once().await.unwrap();
    assert_eq!(second.picked, 0);

    let inbox = ctx.state.notification_service.list(&ctx.agent, false).await.unwrap();
    assert_eq!(inbox.iter().filter(|n| n.kind == NotificationKind::Reminder).count(), 1);

    let scheduled = ctx
        .state
        .notification_service
        .list_scheduled(&ctx.agent, Some(ScheduledStatus::Sent))
        .await
        .unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].client_note_id, Some(note.id));

    // Enviado não volta a ser cancelável
    let cancel = ctx.state.notification_service.cancel_scheduled(scheduled[0].id, &ctx.agent).await;
    assert!(matches!(cancel, Err(AppError::InvalidStateTransition { .. })));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn completing_a_note_cancels_its_reminder_and_is_audited(pool: PgPool) {
    let ctx = setup(pool).await;

    let client = ctx
        .state
        .crm_service
        .create_client(
            &CreateClientPayload {
                full_name: "João Pereira".into(),
                email: None,
                phone: None,
                document_number: None,
                client_type: None,
                notes: None,
            },
            &ctx.agent,
        )
        .await
        .unwrap();

    let note = ctx
        .state
        .crm_service
        .create_note(
            client.id,
            &CreateNotePayload {
                title: "Visita ao imóvel".into(),
                content: "Levar chaves".into(),
                note_type: None,
                priority: None,
                reminder_date: Some(Utc::now() + Duration::days(2)),
            },
            &ctx.agent,
        )
        .await
        .unwrap();

    let done = ctx
        .state
        .crm_service
        .update_note(note.id, &UpdateNotePayload { is_completed: Some(true), ..Default::default() }, &ctx.agent)
        .await
        .unwrap();
    assert!(done.is_completed);
    assert!(done.completed_at.is_some());

    let cancelled = ctx
        .state
        .notification_service
        .list_scheduled(&ctx.agent, Some(ScheduledStatus::Cancelled))
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);

    let audit = ctx.state.crm_service.note_audit(note.id, &ctx.agent).await.unwrap();
    assert!(audit.iter().any(|a| a.action == "created"));
    assert!(audit.iter().any(|a| a.action == "completed"));
    assert!(audit.iter().any(|a| a.field.as_deref() == Some("isCompleted")));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn reopening_a_note_schedules_its_reminder_again(pool: PgPool) {
    let ctx = setup(pool).await;
    let client = new_client(&ctx, "Ana Souza").await;
    let note = note_with_reminder(&ctx, &client, "Retornar sobre a contraproposta", Utc::now() + Duration::days(1)).await;

    let crm = &ctx.state.crm_service;
    crm.update_note(note.id, &UpdateNotePayload { is_completed: Some(true), ..Default::default() }, &ctx.agent)
        .await
        .unwrap();
    assert!(scheduled_with(&ctx, ScheduledStatus::Pending).await.is_empty());

    let reopened = crm
        .update_note(note.id, &UpdateNotePayload { is_completed: Some(false), ..Default::default() }, &ctx.agent)
        .await
        .unwrap();
    assert!(!reopened.is_completed);

    let pending = scheduled_with(&ctx, ScheduledStatus::Pending).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].client_note_id, Some(note.id));
    assert_eq!(pending[0].scheduled_for.timestamp_micros(), note.reminder_date.unwrap().timestamp_micros());
    assert_eq!(scheduled_with(&ctx, ScheduledStatus::Cancelled).await.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn concurrent_sweeps_deliver_a_reminder_once(pool: PgPool) {
    let ctx = setup(pool).await;
    let client = new_client(&ctx, "Carlos Lima").await;
    note_with_reminder(&ctx, &client, "Enviar minuta", Utc::now() - Duration::minutes(5)).await;

    let scheduler = &ctx.state.notification_scheduler;
    let (a, b) = tokio::join!(scheduler.run_sweep_once(), scheduler.run_sweep_once());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.picked + b.picked, 1);
    assert_eq!(a.sent + b.sent, 1);
    assert_eq!(reminder_count(&ctx).await, 1);
    assert_eq!(scheduled_with(&ctx, ScheduledStatus::Sent).await.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn failed_delivery_is_retried_on_next_sweep(pool: PgPool) {
    let ctx = setup(pool.clone()).await;
    let client = new_client(&ctx, "Beatriz Nunes").await;
    note_with_reminder(&ctx, &client, "Cobrar certidões", Utc::now() - Duration::minutes(5)).await;

    // Recusa notificações de lembrete até a constraint sair
    sqlx::query("ALTER TABLE notifications ADD CONSTRAINT recusa_lembrete CHECK (title NOT LIKE 'Lembrete:%')")
        .execute(&pool)
        .await
        .unwrap();

    let scheduler = &ctx.state.notification_scheduler;
    let first = scheduler.run_sweep_once().await.unwrap();
    assert_eq!((first.picked, first.sent, first.failed), (1, 0, 1));

    let failed = scheduled_with(&ctx, ScheduledStatus::Failed).await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].retry_count, 1);
    assert!(failed[0].last_error.is_some());
    assert_eq!(reminder_count(&ctx).await, 0);

    sqlx::query("ALTER TABLE notifications DROP CONSTRAINT recusa_lembrete")
        .execute(&pool)
        .await
        .unwrap();

    let second = scheduler.run_sweep_once().await.unwrap();
    assert_eq!((second.picked, second.sent, second.failed), (1, 1, 0));

    let sent = scheduled_with(&ctx, ScheduledStatus::Sent).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, failed[0].id);
    assert!(sent[0].sent_at.is_some());
    assert_eq!(reminder_count(&ctx).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn cancelled_reminder_is_skipped_by_sweep(pool: PgPool) {
    let ctx = setup(pool).await;
    let client = new_client(&ctx, "Diego Ramos").await;
    note_with_reminder(&ctx, &client, "Agendar vistoria", Utc::now() - Duration::minutes(5)).await;

    let pending = scheduled_with(&ctx, ScheduledStatus::Pending).await;
    assert_eq!(pending.len(), 1);

    let cancelled = ctx.state.notification_service.cancel_scheduled(pending[0].id, &ctx.agent).await.unwrap();
    assert_eq!(cancelled.status, ScheduledStatus::Cancelled);

    let report = ctx.state.notification_scheduler.run_sweep_once().await.unwrap();
    assert_eq!(report.picked, 0);
    assert_eq!(reminder_count(&ctx).await, 0);
    assert_eq!(scheduled_with(&ctx, ScheduledStatus::Cancelled).await.len(), 1);
}

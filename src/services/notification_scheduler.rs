// src/services/notification_scheduler.rs

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection, PgPool};
use tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    common::error::AppError,
    db::NotificationRepository,
    models::notification::{ScheduledNotification, SweepReport},
};

struct RunningSweep {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Varredura periódica que transforma agendamentos vencidos em notificações in-app.
#[derive(Clone)]
pub struct NotificationScheduler {
    repo: NotificationRepository,
    pool: PgPool,
    interval: Duration,
    batch_size: i64,
    running: Arc<Mutex<Option<RunningSweep>>>,
}

impl NotificationScheduler {
    pub fn new(repo: NotificationRepository, pool: PgPool, interval: Duration, batch_size: i64) -> Self {
        Self {
            repo,
            pool,
            interval,
            batch_size,
            running: Arc::new(Mutex::new(None)),
        }
    }

    /// Inicia o laço em segundo plano. Retorna false se já estava rodando.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let scheduler = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        // Cancelar no meio da varredura derruba a transação (rollback)
                        tokio::select! {
                            _ = token.cancelled() => break,
                            result = scheduler.run_sweep_once() => match result {
                                Ok(report) if report.picked > 0 => tracing::info!(
                                    "📬 Varredura: {} vencida(s), {} enviada(s), {} com falha",
                                    report.picked, report.sent, report.failed
                                ),
                                Ok(_) => tracing::debug!("Varredura sem notificações vencidas"),
                                Err(e) => tracing::error!("Falha na varredura de notificações: {}", e),
                            },
                        }
                    }
                }
            }
            tracing::info!("Agendador de notificações parado");
        });

        *running = Some(RunningSweep { cancel, handle });
        tracing::info!(
            "⏰ Agendador de notificações iniciado (intervalo {:?}, lote {})",
            self.interval,
            self.batch_size
        );
        true
    }

    /// Cancela o laço e espera a task terminar.
    pub async fn stop(&self) {
        let current = self.running.lock().await.take();
        if let Some(RunningSweep { cancel, handle }) = current {
            cancel.cancel();
            if let Err(e) = handle.await {
                tracing::error!("Task do agendador terminou com erro: {}", e);
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Uma rodada: trava um lote vencido (SKIP LOCKED) e entrega cada item num savepoint.
    pub async fn run_sweep_once(&self) -> Result<SweepReport, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let due = self.repo.claim_due(&mut *tx, now, self.batch_size).await?;
        let mut report = SweepReport { picked: due.len(), ..SweepReport::default() };

        for scheduled in &due {
            match self.deliver(&mut tx, scheduled, now).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    tracing::warn!(
                        "Falha ao entregar agendamento {} (tentativa {}): {}",
                        scheduled.id,
                        scheduled.retry_count + 1,
                        e
                    );
                    self.repo.mark_failed(&mut *tx, scheduled.id, &e.to_string()).await?;
                    report.failed += 1;
                }
            }
        }

        tx.commit().await?;
        Ok(report)
    }

    async fn deliver(
        &self,
        conn: &mut PgConnection,
        scheduled: &ScheduledNotification,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut savepoint = conn.begin().await?;

        // None = já entregue antes (constraint única na origem); só falta marcar SENT
        if self.repo.insert_from_schedule(&mut *savepoint, scheduled).await?.is_none() {
            tracing::debug!("Agendamento {} já tinha notificação", scheduled.id);
        }
        self.repo.mark_sent(&mut *savepoint, scheduled.id, now).await?;

        savepoint.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn scheduler(interval: Duration) -> NotificationScheduler {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://127.0.0.1:1/inexistente")
            .unwrap();
        NotificationScheduler::new(NotificationRepository::new(pool.clone()), pool, interval, 10)
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_waits_for_the_loop() {
        let scheduler = scheduler(Duration::from_secs(3600));

        assert!(scheduler.start().await);
        assert!(!scheduler.start().await);
        assert!(scheduler.is_running().await);

        scheduler.stop().await;
        assert!(!scheduler.is_running().await);

        // Pode ser religado depois de parado
        assert!(scheduler.start().await);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn stop_without_start_is_harmless() {
        let scheduler = scheduler(Duration::from_secs(1));
        scheduler.stop().await;
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test]
    async fn sweep_surfaces_database_errors() {
        let scheduler = scheduler(Duration::from_secs(1));
        assert!(scheduler.run_sweep_once().await.is_err());
    }
}

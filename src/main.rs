//src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use corretora_backend::{
    build_router,
    config::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;
    let app_state = AppState::new(config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if let (Some(email), Some(password)) = (&app_state.config.admin_email, &app_state.config.admin_password) {
        app_state.auth_service.ensure_bootstrap_admin(email, password).await?;
    }

    if app_state.config.sweep_enabled {
        app_state.notification_scheduler.start().await;
    } else {
        tracing::warn!("Agendador de lembretes desligado (NOTIFICATION_SWEEP_ENABLED=false)");
    }

    let scheduler = app_state.notification_scheduler.clone();
    let bind_addr = app_state.config.bind_addr;
    let app = build_router(app_state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    tracing::info!("Servidor encerrado");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Falha ao escutar o sinal de encerramento: {}", e);
    }
}

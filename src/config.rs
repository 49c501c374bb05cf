// src/config.rs

use std::{env, net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::{
        CrmRepository, NotificationRepository, PendencyRepository, PropertyRepository,
        RegistryRepository, UserRepository,
    },
    services::{
        advancement_service::AdvancementService, auth::AuthService, crm_service::CrmService,
        notification_scheduler::NotificationScheduler, notification_service::NotificationService,
        pendency_service::PendencyService, property_service::PropertyService,
        registry_service::RegistryService,
    },
};

// Configuração lida das variáveis de ambiente (.env carregado no main)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub db_timeout: Duration,
    pub jwt_ttl_hours: i64,
    pub sweep_interval: Duration,
    pub sweep_batch_size: i64,
    pub sweep_enabled: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{} inválido ({:?}): {}", key, raw, e)),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta a configuração a partir de qualquer fonte chave -> valor.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        if jwt_secret.trim().is_empty() {
            return Err(anyhow!("JWT_SECRET não pode ser vazio"));
        }

        let sweep_interval_secs: u64 = parse_or(&lookup, "NOTIFICATION_SWEEP_INTERVAL_SECS", 300)?;
        if sweep_interval_secs == 0 {
            return Err(anyhow!("NOTIFICATION_SWEEP_INTERVAL_SECS deve ser maior que zero"));
        }
        let sweep_batch_size: i64 = parse_or(&lookup, "NOTIFICATION_SWEEP_BATCH_SIZE", 100)?;
        if sweep_batch_size <= 0 {
            return Err(anyhow!("NOTIFICATION_SWEEP_BATCH_SIZE deve ser maior que zero"));
        }
        let db_max_connections: u32 = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?;
        if db_max_connections == 0 {
            return Err(anyhow!("DB_MAX_CONNECTIONS deve ser maior que zero"));
        }

        let admin_email = lookup("ADMIN_EMAIL").filter(|v| !v.trim().is_empty());
        let admin_password = lookup("ADMIN_PASSWORD").filter(|v| !v.is_empty());
        if admin_email.is_some() != admin_password.is_some() {
            return Err(anyhow!("ADMIN_EMAIL e ADMIN_PASSWORD devem ser definidos juntos"));
        }

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            db_max_connections,
            db_timeout: Duration::from_secs(parse_or(&lookup, "DB_TIMEOUT_SECS", 8)?),
            jwt_ttl_hours: parse_or(&lookup, "JWT_TTL_HOURS", 12)?,
            sweep_interval: Duration::from_secs(sweep_interval_secs),
            sweep_batch_size,
            sweep_enabled: parse_or(&lookup, "NOTIFICATION_SWEEP_ENABLED", true)?,
            admin_email,
            admin_password,
        })
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub i18n_store: Arc<I18nStore>,
    pub auth_service: AuthService,
    pub property_service: PropertyService,
    pub pendency_service: PendencyService,
    pub advancement_service: AdvancementService,
    pub notification_service: NotificationService,
    pub notification_scheduler: NotificationScheduler,
    pub crm_service: CrmService,
    pub registry_service: RegistryService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::from_pool(db_pool, config))
    }

    // --- Monta o gráfico de dependências ---
    pub fn from_pool(db_pool: PgPool, config: Config) -> Self {
        let user_repo = UserRepository::new(db_pool.clone());
        let property_repo = PropertyRepository::new(db_pool.clone());
        let pendency_repo = PendencyRepository::new(db_pool.clone());
        let notification_repo = NotificationRepository::new(db_pool.clone());
        let crm_repo = CrmRepository::new(db_pool.clone());
        let registry_repo = RegistryRepository::new(db_pool.clone());

        let auth_service = AuthService::new(
            user_repo,
            config.jwt_secret.clone(),
            config.jwt_ttl_hours,
            db_pool.clone(),
        );
        let pendency_service = PendencyService::new(
            pendency_repo.clone(),
            property_repo.clone(),
            notification_repo.clone(),
            db_pool.clone(),
        );
        let advancement_service = AdvancementService::new(
            property_repo.clone(),
            pendency_repo.clone(),
            notification_repo.clone(),
            pendency_service.clone(),
            db_pool.clone(),
        );
        let property_service = PropertyService::new(
            property_repo.clone(),
            pendency_repo,
            crm_repo.clone(),
            registry_repo.clone(),
            db_pool.clone(),
        );
        let notification_service = NotificationService::new(notification_repo.clone(), db_pool.clone());
        let notification_scheduler = NotificationScheduler::new(
            notification_repo.clone(),
            db_pool.clone(),
            config.sweep_interval,
            config.sweep_batch_size,
        );
        let crm_service = CrmService::new(crm_repo, notification_repo, db_pool.clone());
        let registry_service = RegistryService::new(registry_repo, property_repo, db_pool.clone());

        Self {
            db_pool,
            config: Arc::new(config),
            i18n_store: I18nStore::shared(),
            auth_service,
            property_service,
            pendency_service,
            advancement_service,
            notification_service,
            notification_scheduler,
            crm_service,
            registry_service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/corretora"),
        ("JWT_SECRET", "segredo"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.db_timeout, Duration::from_secs(8));
        assert_eq!(config.jwt_ttl_hours, 12);
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.sweep_batch_size, 100);
        assert!(config.sweep_enabled);
        assert!(config.admin_email.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("NOTIFICATION_SWEEP_INTERVAL_SECS", "30"),
            ("NOTIFICATION_SWEEP_BATCH_SIZE", "25"),
            ("NOTIFICATION_SWEEP_ENABLED", "false"),
            ("ADMIN_EMAIL", "admin@corretora.com.br"),
            ("ADMIN_PASSWORD", "troque-me-ja"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.sweep_batch_size, 25);
        assert!(!config.sweep_enabled);
        assert_eq!(config.admin_email.as_deref(), Some("admin@corretora.com.br"));
    }

    #[test]
    fn missing_or_invalid_values_are_errors() {
        assert!(Config::from_lookup(lookup(&[("JWT_SECRET", "x")])).is_err());

        for bad in [
            ("NOTIFICATION_SWEEP_INTERVAL_SECS", "0"),
            ("NOTIFICATION_SWEEP_BATCH_SIZE", "-1"),
            ("DB_TIMEOUT_SECS", "oito"),
            ("ADMIN_EMAIL", "so-email@corretora.com.br"),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push(bad);
            assert!(Config::from_lookup(lookup(&pairs)).is_err(), "{:?} deveria falhar", bad);
        }
    }
}

// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{user_repo::NewUser, UserRepository},
    models::auth::{
        Claims, CreateAgentPayload, CurrentUser, ProvisionPartnerPayload, User, UserRole,
    },
};

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt_secret: String,
    token_ttl_hours: i64,
    pool: PgPool,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, jwt_secret: String, token_ttl_hours: i64, pool: PgPool) -> Self {
        Self { user_repo, jwt_secret, token_ttl_hours, pool }
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = self.user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || {
            verify(&password_clone, &password_hash_clone)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))?
        ?;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        // Só depois da senha conferida, para não revelar quais contas existem
        if !user.is_active {
            tracing::warn!("Login recusado para usuário inativo {}", user.id);
            return Err(AppError::UserInactive);
        }

        self.create_token(&user)
    }

    // O token carrega id, e-mail e papel: nenhuma consulta ao banco por requisição
    pub fn validate_token(&self, token: &str) -> Result<CurrentUser, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        Ok(CurrentUser::from(token_data.claims))
    }

    pub async fn find_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    // =========================================================================
    //  PROVISIONAMENTO (admin)
    // =========================================================================

    pub async fn create_agent(&self, admin_id: Uuid, payload: &CreateAgentPayload) -> Result<User, AppError> {
        let hashed_password = hash_password(&payload.password).await?;

        let user = self.user_repo
            .create_user(
                &self.pool,
                &NewUser {
                    email: &payload.email,
                    password_hash: &hashed_password,
                    full_name: &payload.full_name,
                    role: UserRole::Agent,
                    partner_kind: None,
                    creci: payload.creci.as_deref(),
                    document_number: None,
                    company_name: None,
                    created_by: Some(admin_id),
                },
            )
            .await?;

        tracing::info!("👤 Corretor {} criado pelo admin {}", user.id, admin_id);
        Ok(user)
    }

    pub async fn provision_partner(
        &self,
        admin_id: Uuid,
        payload: &ProvisionPartnerPayload,
    ) -> Result<User, AppError> {
        let hashed_password = hash_password(&payload.password).await?;

        let user = self.user_repo
            .create_user(
                &self.pool,
                &NewUser {
                    email: &payload.email,
                    password_hash: &hashed_password,
                    full_name: &payload.full_name,
                    role: UserRole::Partner,
                    partner_kind: Some(payload.kind),
                    creci: payload.creci.as_deref(),
                    document_number: payload.document_number.as_deref(),
                    company_name: payload.company_name.as_deref(),
                    created_by: Some(admin_id),
                },
            )
            .await?;

        tracing::info!("🤝 Parceiro B2B {} ({:?}) provisionado pelo admin {}", user.id, payload.kind, admin_id);
        Ok(user)
    }

    pub async fn list_partners(&self) -> Result<Vec<User>, AppError> {
        self.user_repo.list_by_role(&self.pool, UserRole::Partner).await
    }

    pub async fn set_partner_status(&self, partner_id: Uuid, is_active: bool) -> Result<User, AppError> {
        let user = self.user_repo
            .set_active(&self.pool, partner_id, UserRole::Partner, is_active)
            .await?
            .ok_or(AppError::UserNotFound)?;

        tracing::info!("Parceiro {} agora {}", user.id, if is_active { "ativo" } else { "inativo" });
        Ok(user)
    }

    /// Cria o primeiro admin a partir das variáveis de ambiente, se ainda não houver nenhum.
    pub async fn ensure_bootstrap_admin(&self, email: &str, password: &str) -> Result<bool, AppError> {
        if self.user_repo.count_by_role(UserRole::Admin).await? > 0 {
            return Ok(false);
        }

        let hashed_password = hash_password(password).await?;
        let admin = self.user_repo
            .create_user(
                &self.pool,
                &NewUser {
                    email,
                    password_hash: &hashed_password,
                    full_name: "Administrador",
                    role: UserRole::Admin,
                    partner_kind: None,
                    creci: None,
                    document_number: None,
                    company_name: None,
                    created_by: None,
                },
            )
            .await?;

        tracing::info!("🔑 Admin inicial criado: {}", admin.email);
        Ok(true)
    }

    fn create_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::hours(self.token_ttl_hours);

        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

async fn hash_password(password: &str) -> Result<String, AppError> {
    let password_clone = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))?
        ?;
    Ok(hashed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn service() -> AuthService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/corretora_test")
            .unwrap();
        AuthService::new(UserRepository::new(pool.clone()), "segredo-de-teste".into(), 12, pool)
    }

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "ana@corretora.com.br".into(),
            password_hash: String::new(),
            full_name: "Ana".into(),
            role,
            partner_kind: None,
            creci: None,
            document_number: None,
            company_name: None,
            is_active: true,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn token_round_trips_identity_and_role() {
        let service = service();
        let agent = user(UserRole::Agent);

        let token = service.create_token(&agent).unwrap();
        let current = service.validate_token(&token).unwrap();

        assert_eq!(current.id, agent.id);
        assert_eq!(current.email, agent.email);
        assert_eq!(current.role, UserRole::Agent);
        assert_eq!(current.owner_scope(), Some(agent.id));
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let service = service();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/corretora_test")
            .unwrap();
        let other = AuthService::new(UserRepository::new(pool.clone()), "outro".into(), 12, pool);

        let token = other.create_token(&user(UserRole::Admin)).unwrap();
        assert!(matches!(service.validate_token(&token), Err(AppError::InvalidToken)));
        assert!(matches!(service.validate_token("lixo"), Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/corretora_test")
            .unwrap();
        let service = AuthService::new(UserRepository::new(pool.clone()), "segredo".into(), -2, pool);

        let token = service.create_token(&user(UserRole::Agent)).unwrap();
        assert!(matches!(service.validate_token(&token), Err(AppError::InvalidToken)));
    }
}

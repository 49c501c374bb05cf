// src/middleware/rbac.rs

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use std::marker::PhantomData;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::UserRole,
};

/// O que um papel precisa ter para passar pelo guardião
pub trait RoleRequirement: Send + Sync + 'static {
    fn allows(role: UserRole) -> bool;
}

/// Extractor que barra com 403 quem não tem o papel exigido
pub struct RequireRole<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleRequirement,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !T::allows(user.role) {
            let app_state = AppState::from_ref(state);
            let locale = Locale::from_request_parts(parts, state).await.unwrap_or_default();
            tracing::warn!("Acesso negado para {} ({:?}) em {}", user.id, user.role, parts.uri.path());
            return Err(AppError::Forbidden.to_api_error(&locale, &app_state.i18n_store));
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// PAPÉIS
// ---

pub struct AdminOnly;
impl RoleRequirement for AdminOnly {
    fn allows(role: UserRole) -> bool {
        role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_passes_admin_only() {
        assert!(AdminOnly::allows(UserRole::Admin));
        assert!(!AdminOnly::allows(UserRole::Agent));
        assert!(!AdminOnly::allows(UserRole::Partner));
    }
}

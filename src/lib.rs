// src/lib.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

/// Monta o router completo da API, com Swagger e camadas HTTP.
pub fn build_router(app_state: AppState) -> Router {
    // Rotas públicas
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth::login));

    let user_routes = Router::new()
        .route("/users/me", get(handlers::auth::get_me));

    let admin_routes = Router::new()
        .route("/admin/users", post(handlers::admin::create_agent))
        .route("/admin/b2b-users"
               ,post(handlers::admin::provision_partner)
               .get(handlers::admin::list_partners)
        )
        .route("/admin/b2b-users/{id}/status", patch(handlers::admin::set_partner_status));

    let property_routes = Router::new()
        .route("/properties"
               ,post(handlers::properties::create_property)
               .get(handlers::properties::list_properties)
        )
        .route("/properties/{id}"
               ,get(handlers::properties::get_property)
               .put(handlers::properties::update_property)
               .delete(handlers::properties::delete_property)
        )
        .route("/properties/{id}/pendencies", get(handlers::pendencies::get_pendencies))
        .route("/properties/{id}/advance-stage", post(handlers::pendencies::advance_stage))
        .route("/properties/{id}/requirements", get(handlers::pendencies::list_requirements))
        .route("/properties/{id}/requirements/{req_id}", put(handlers::pendencies::update_requirement))
        .route("/properties/{id}/advancement-logs", get(handlers::pendencies::list_advancement_logs))
        .route("/properties/{id}/metrics", get(handlers::pendencies::list_metrics));

    let notification_routes = Router::new()
        .route("/notifications", get(handlers::notifications::list_notifications))
        .route("/notifications/{id}/read", patch(handlers::notifications::mark_notification_read))
        .route("/pendency-notifications", get(handlers::notifications::list_pendency_notifications))
        .route("/scheduled-notifications", get(handlers::notifications::list_scheduled))
        .route("/scheduled-notifications/{id}/cancel", post(handlers::notifications::cancel_scheduled))
        .route("/stage-requirements", get(handlers::pendencies::list_stage_requirements));

    let crm_routes = Router::new()
        .route("/clients"
               ,post(handlers::crm::create_client)
               .get(handlers::crm::list_clients)
        )
        .route("/clients/{id}"
               ,get(handlers::crm::get_client)
               .put(handlers::crm::update_client)
               .delete(handlers::crm::delete_client)
        )
        .route("/clients/{id}/notes"
               ,post(handlers::crm::create_note)
               .get(handlers::crm::list_notes)
        )
        .route("/notes/{id}"
               ,put(handlers::crm::update_note)
               .delete(handlers::crm::delete_note)
        )
        .route("/notes/{id}/audit", get(handlers::crm::note_audit));

    let registry_routes = Router::new()
        .route("/cartorios"
               ,post(handlers::registry::create_cartorio)
               .get(handlers::registry::list_cartorios)
        )
        .route("/cartorios/{id}", get(handlers::registry::get_cartorio))
        .route("/registros"
               ,post(handlers::registry::create_registro)
               .get(handlers::registry::list_registros)
        )
        .route("/registros/{id}"
               ,get(handlers::registry::get_registro)
               .put(handlers::registry::update_registro)
        );

    // Tudo abaixo exige Bearer válido
    let protected = Router::new()
        .merge(user_routes)
        .merge(admin_routes)
        .merge(property_routes)
        .merge(notification_routes)
        .merge(crm_routes)
        .merge(registry_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let api = Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/auth", auth_routes)
        .merge(protected);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::get_me,

        // --- Admin ---
        handlers::admin::create_agent,
        handlers::admin::provision_partner,
        handlers::admin::list_partners,
        handlers::admin::set_partner_status,

        // --- Imóveis ---
        handlers::properties::create_property,
        handlers::properties::list_properties,
        handlers::properties::get_property,
        handlers::properties::update_property,
        handlers::properties::delete_property,

        // --- Pendências ---
        handlers::pendencies::get_pendencies,
        handlers::pendencies::advance_stage,
        handlers::pendencies::update_requirement,
        handlers::pendencies::list_requirements,
        handlers::pendencies::list_advancement_logs,
        handlers::pendencies::list_metrics,
        handlers::pendencies::list_stage_requirements,

        // --- Notificações ---
        handlers::notifications::list_notifications,
        handlers::notifications::mark_notification_read,
        handlers::notifications::list_pendency_notifications,
        handlers::notifications::list_scheduled,
        handlers::notifications::cancel_scheduled,

        // --- CRM ---
        handlers::crm::create_client,
        handlers::crm::list_clients,
        handlers::crm::get_client,
        handlers::crm::update_client,
        handlers::crm::delete_client,
        handlers::crm::create_note,
        handlers::crm::list_notes,
        handlers::crm::update_note,
        handlers::crm::delete_note,
        handlers::crm::note_audit,

        // --- Registro ---
        handlers::registry::create_cartorio,
        handlers::registry::list_cartorios,
        handlers::registry::get_cartorio,
        handlers::registry::create_registro,
        handlers::registry::list_registros,
        handlers::registry::get_registro,
        handlers::registry::update_registro,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::PartnerKind,
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::CreateAgentPayload,
            models::auth::ProvisionPartnerPayload,
            models::auth::UpdateUserStatusPayload,
            models::auth::AuthResponse,
            models::auth::CurrentUser,

            // --- Imóveis ---
            models::property::PropertyStage,
            models::property::Property,
            models::property::CreatePropertyPayload,
            models::property::UpdatePropertyPayload,
            models::property::AdvanceStagePayload,

            // --- Pendências ---
            models::pendency::RequirementCategory,
            models::pendency::RequirementPriority,
            models::pendency::RequirementStatus,
            models::pendency::AdvancementOutcome,
            models::pendency::StageRequirement,
            models::pendency::PendencyItem,
            models::pendency::StageCompletionMetric,
            models::pendency::StageAdvancementLog,
            models::pendency::PendencyNotification,
            models::pendency::PendencyValidationResult,
            models::pendency::UpdateRequirementPayload,
            models::pendency::RequirementUpdateResponse,
            models::pendency::AdvancementResponse,

            // --- Notificações ---
            models::notification::NotificationKind,
            models::notification::ScheduledStatus,
            models::notification::Notification,
            models::notification::ScheduledNotification,
            models::notification::SweepReport,

            // --- CRM ---
            models::crm::ClientType,
            models::crm::NoteType,
            models::crm::NotePriority,
            models::crm::NoteStatus,
            models::crm::Client,
            models::crm::CreateClientPayload,
            models::crm::UpdateClientPayload,
            models::crm::ClientNote,
            models::crm::CreateNotePayload,
            models::crm::UpdateNotePayload,
            models::crm::NoteAuditEntry,

            // --- Registro ---
            models::registry::Cartorio,
            models::registry::CreateCartorioPayload,
            models::registry::RegistroStatus,
            models::registry::Registro,
            models::registry::CreateRegistroPayload,
            models::registry::UpdateRegistroPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação"),
        (name = "Admin", description = "Gestão de corretores e parceiros B2B"),
        (name = "Imóveis", description = "Cadastro de imóveis"),
        (name = "Pendências", description = "Checklist por etapa e avanço do pipeline"),
        (name = "Notificações", description = "Notificações e lembretes agendados"),
        (name = "CRM", description = "Clientes e anotações"),
        (name = "Registro", description = "Cartórios e registros de imóveis")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_core_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/properties/{id}/advance-stage"));
        assert!(doc.paths.paths.contains_key("/api/notes/{id}/audit"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("api_jwt"));
    }
}

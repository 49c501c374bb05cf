pub mod advancement_service;
pub mod auth;
pub mod crm_service;
pub mod notification_scheduler;
pub mod notification_service;
pub mod pendency_service;
pub mod property_service;
pub mod registry_service;

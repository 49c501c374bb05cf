pub mod admin;
pub mod auth;
pub mod crm;
pub mod notifications;
pub mod pendencies;
pub mod properties;
pub mod registry;

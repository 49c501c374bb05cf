pub mod auth;
pub mod crm;
pub mod notification;
pub mod pendency;
pub mod property;
pub mod registry;

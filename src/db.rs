pub mod user_repo;
pub use user_repo::UserRepository;
pub mod property_repo;
pub use property_repo::PropertyRepository;
pub mod pendency_repo;
pub use pendency_repo::PendencyRepository;
pub mod notification_repo;
pub use notification_repo::NotificationRepository;
pub mod crm_repo;
pub use crm_repo::CrmRepository;
pub mod registry_repo;
pub use registry_repo::RegistryRepository;

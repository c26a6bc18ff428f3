// Declare submodules
pub mod notification_dto;
pub mod notification_handlers;
pub mod notification_models;
pub mod notification_repository;

// Re-export public items
pub use notification_dto::{
    CreateNotificationRequest, ListNotificationsQuery, MarkAllReadRequest, MarkReadRequest,
};
pub use notification_models::Notification;
pub use notification_repository::NotificationRepository;

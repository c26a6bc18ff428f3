// Declare submodules
pub mod sync_engine;
pub mod sync_service;
pub mod sync_store;

// Re-export public items
pub use sync_engine::{NotificationSync, SyncEvent};
pub use sync_service::{start_sync_service, SyncService};
pub use sync_store::{HttpNotificationStore, NotificationStore};

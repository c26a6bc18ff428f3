//! Notification delivery and read-state reconciliation.
//!
//! [`NotificationSync`] keeps a client-local cache of one recipient's
//! notifications approximately consistent with a server store through full
//! and delta fetches, with optimistic read-state. The crate also ships the
//! store itself: a small axum service over an in-memory repository, plus a
//! reqwest-backed [`NotificationStore`] implementation to talk to it.

pub mod config;
pub mod error;
pub mod notification;
pub mod routes;
pub mod state;
pub mod sync;

pub use config::Config;
pub use error::{AppError, StoreError};
pub use notification::Notification;
pub use routes::create_router;
pub use state::AppState;
pub use sync::{
    start_sync_service, HttpNotificationStore, NotificationStore, NotificationSync, SyncEvent,
    SyncService,
};

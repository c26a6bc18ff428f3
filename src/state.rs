use std::sync::Arc;

use crate::config::Config;
use crate::notification::NotificationRepository;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub notification_repository: NotificationRepository,
}

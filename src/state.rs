use crate::adapters::StoreBackend;
use crate::auth::AdminAuth;
use crate::config::AppConfig;
use crate::push;

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: StoreBackend,
    /// `None` when VAPID keys are missing; broadcasting is then unavailable.
    pub(crate) dispatcher: Option<Arc<push::BroadcastDispatcher>>,
    pub admin: Option<AdminAuth>,
}

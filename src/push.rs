use crate::adapters::{StoreBackend, SystemClock, WebPushSender};
use crate::config;

pub mod dispatcher;
pub mod registrar;
pub mod vapid;

use tracing::warn;

pub use dispatcher::{BroadcastError, Dispatcher};
pub use registrar::{Registrar, RegistrarError, RegistrationState};
pub(crate) use vapid::{VapidConfigStatus, load_vapid_config};

pub(crate) type BroadcastDispatcher = Dispatcher<WebPushSender, StoreBackend, SystemClock>;

/// Builds the production dispatcher, or `None` when push is not configured.
/// A missing configuration disables broadcasting; it never stops the server.
pub(crate) fn build_dispatcher(
    config: &config::AppConfig,
    store: StoreBackend,
) -> Option<BroadcastDispatcher> {
    let vapid = match load_vapid_config(config) {
        VapidConfigStatus::Ready(vapid) => vapid,
        VapidConfigStatus::Incomplete => {
            warn!("push notifications disabled: incomplete VAPID configuration");
            return None;
        }
        VapidConfigStatus::Missing => {
            warn!("push notifications disabled: no VAPID keys configured");
            return None;
        }
    };

    let sender = match WebPushSender::new(vapid) {
        Ok(sender) => sender,
        Err(err) => {
            warn!(error = %err, "push notifications disabled: failed to init web-push");
            return None;
        }
    };

    Some(
        Dispatcher::new(sender, store, SystemClock, config.delivery_timeout)
            .with_history(config.record_history),
    )
}

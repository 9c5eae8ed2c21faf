use std::pin::Pin;

use crate::types::push::Registration;

pub type PlatformFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, PlatformError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// The user has not been asked yet.
    Default,
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PlatformError(pub String);

/// The device side of web push: notification permission plus the push
/// manager that owns this device's registration.
pub trait PushPlatform: Send + Sync {
    fn is_supported(&self) -> bool;
    fn permission(&self) -> Permission;
    fn request_permission(&self) -> PlatformFuture<'_, Permission>;
    fn register<'a>(&'a self, application_server_key: &'a [u8]) -> PlatformFuture<'a, Registration>;
    fn current_registration(&self) -> PlatformFuture<'_, Option<Registration>>;
    fn revoke<'a>(&'a self, endpoint: &'a str) -> PlatformFuture<'a, ()>;
}

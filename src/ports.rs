pub mod platform;
pub mod push;
pub mod store;
pub mod time;

pub use platform::{Permission, PlatformError, PushPlatform};
pub use push::PushSender;
pub use store::{StoreError, SubscriptionStore};
pub use time::Clock;

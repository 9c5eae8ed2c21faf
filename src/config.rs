use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Hosted record store reached over its REST API.
    Rest {
        url: String,
        key: String,
        /// Upper bound for a single request, connect included.
        timeout: Duration,
    },
    /// Local JSON file.
    File { path: PathBuf },
}

#[derive(Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub vapid_private_key: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: Option<String>,
    /// Base64 HS256 key; when set, `/send-notification` requires a bearer token.
    pub admin_key: Option<String>,
    pub delivery_timeout: Duration,
    pub record_history: bool,
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::File {
                path: std::env::temp_dir().join("dishcast-default-store.json"),
            },
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
            admin_key: None,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            record_history: false,
        }
    }
}

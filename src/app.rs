use crate::adapters::{JsonFileStore, RestRecordStore, StoreBackend};
use crate::auth as auth_service;
use crate::config;
use crate::ports::StoreError;
use crate::push as push_service;
use crate::state;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use tower_http::cors::{Any, CorsLayer};

mod auth;
mod push;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid admin configuration: {0}")]
    Auth(#[from] auth_service::AuthError),
    #[error("invalid store configuration: {0}")]
    Store(#[from] StoreError),
}

pub fn app(config: config::AppConfig) -> Result<Router, StartupError> {
    let admin = auth_service::AdminAuth::from_config(&config)?;
    let store = match &config.store {
        config::StoreConfig::Rest { url, key, timeout } => {
            StoreBackend::Rest(RestRecordStore::new(url, key, *timeout)?)
        }
        config::StoreConfig::File { path } => StoreBackend::File(JsonFileStore::new(path)),
    };
    let dispatcher = push_service::build_dispatcher(&config, store.clone()).map(std::sync::Arc::new);
    let state = state::AppState {
        config,
        store,
        dispatcher,
        admin,
    };

    let admin_routes = Router::new()
        .route("/send-notification", post(push::send_notification))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/subscribe", post(push::subscribe))
        .route("/unsubscribe", post(push::unsubscribe))
        .route("/api/push/public-key", get(push::push_public_key))
        .route("/health", get(health))
        .merge(admin_routes)
        .with_state(state)
        .layer(cors))
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

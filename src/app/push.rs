use crate::ports::SubscriptionStore;
use crate::push as push_service;
use crate::state;
use crate::types::push::{BroadcastSummary, Subscription};

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn not_configured() -> ApiError {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "Push notifications are not configured.",
    )
}

#[derive(Serialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

pub(crate) async fn push_public_key(
    State(state): State<state::AppState>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let vapid = match push_service::load_vapid_config(&state.config) {
        push_service::VapidConfigStatus::Ready(vapid) => vapid,
        push_service::VapidConfigStatus::Incomplete | push_service::VapidConfigStatus::Missing => {
            return Err(not_configured());
        }
    };

    Ok(Json(PublicKeyResponse {
        public_key: vapid.public_key,
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct BroadcastRequest {
    pub(crate) title: Option<String>,
    pub(crate) message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BroadcastResponse {
    pub(crate) message: String,
    #[serde(flatten)]
    pub(crate) summary: BroadcastSummary,
}

pub(crate) async fn send_notification(
    State(state): State<state::AppState>,
    body: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    let dispatcher = state.dispatcher.as_ref().ok_or_else(not_configured)?;
    let Json(request) = body.map_err(|rejection| {
        api_error(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;

    let title = request.title.unwrap_or_default();
    let message = request.message.unwrap_or_default();
    match dispatcher.broadcast(&title, &message).await {
        Ok(summary) => Ok(Json(BroadcastResponse {
            message: "Notifications sent".to_string(),
            summary,
        })),
        Err(push_service::BroadcastError::InvalidRequest(reason)) => {
            Err(api_error(StatusCode::BAD_REQUEST, reason))
        }
        Err(err @ push_service::BroadcastError::StoreRead(_)) => {
            error!(error = %err, "broadcast aborted");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscribeRequest {
    pub(crate) endpoint: String,
    pub(crate) keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionKeys {
    pub(crate) p256dh: String,
    pub(crate) auth: String,
}

#[derive(Serialize)]
pub(crate) struct Empty {}

/// Stores a browser `PushSubscription.toJSON()` body, replacing any record
/// with the same endpoint.
pub(crate) async fn subscribe(
    State(state): State<state::AppState>,
    body: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Empty>), ApiError> {
    let Json(request) = body.map_err(|rejection| {
        api_error(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;

    let endpoint = request.endpoint.trim();
    let p256dh = request.keys.p256dh.trim();
    let auth = request.keys.auth.trim();
    if endpoint.is_empty() || p256dh.is_empty() || auth.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "endpoint, keys.p256dh, and keys.auth are required.",
        ));
    }

    let subscription = Subscription {
        endpoint: endpoint.to_string(),
        p256dh: p256dh.to_string(),
        auth: auth.to_string(),
        created_at: OffsetDateTime::now_utc(),
    };
    state.store.upsert(&subscription).await.map_err(|err| {
        error!(error = %err, "failed to store subscription");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    })?;

    info!(endpoint = %subscription.endpoint, "subscription stored");
    Ok((StatusCode::CREATED, Json(Empty {})))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnsubscribeRequest {
    pub(crate) endpoint: String,
}

pub(crate) async fn unsubscribe(
    State(state): State<state::AppState>,
    body: Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        api_error(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;

    let endpoint = request.endpoint.trim();
    if endpoint.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "endpoint is required."));
    }

    state.store.delete(endpoint).await.map_err(|err| {
        error!(error = %err, "failed to delete subscription");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

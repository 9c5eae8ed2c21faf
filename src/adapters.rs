use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::ports;
use crate::ports::SubscriptionStore;
use crate::ports::store::StoreFuture;
use crate::types::push::{BroadcastRecord, Subscription, VapidConfig};

mod file_store;
mod rest_store;

pub use file_store::JsonFileStore;
pub use rest_store::RestRecordStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ports::Clock for SystemClock {
    type Sleep<'a>
        = tokio::time::Sleep
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        tokio::time::sleep(duration)
    }
}

#[derive(Clone)]
pub struct WebPushSender {
    vapid: VapidConfig,
    client: Arc<web_push::WebPushClient>,
}

impl WebPushSender {
    pub fn new(vapid: VapidConfig) -> Result<Self, web_push::WebPushError> {
        let client = web_push::WebPushClient::new()?;
        Ok(Self {
            vapid,
            client: Arc::new(client),
        })
    }
}

impl ports::PushSender for WebPushSender {
    type Error = web_push::WebPushError;
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send + 'a>>
    where
        Self: 'a;

    fn send<'a>(&'a self, subscription: &'a Subscription, payload: &'a str) -> Self::Fut<'a> {
        Box::pin(async move {
            let subscription_info = web_push::SubscriptionInfo::new(
                subscription.endpoint.clone(),
                subscription.p256dh.clone(),
                subscription.auth.clone(),
            );
            let mut builder = web_push::WebPushMessageBuilder::new(&subscription_info)?;
            builder.set_payload(web_push::ContentEncoding::Aes128Gcm, payload.as_bytes());
            let mut signature_builder = web_push::VapidSignatureBuilder::from_base64(
                &self.vapid.private_key,
                web_push::URL_SAFE_NO_PAD,
                &subscription_info,
            )?;
            signature_builder.add_claim("sub", self.vapid.subject.as_str());
            builder.set_vapid_signature(signature_builder.build()?);
            self.client.send(builder.build()?).await
        })
    }

    fn is_gone(&self, error: &Self::Error) -> bool {
        is_gone_error(error)
    }
}

/// web-push maps 410 to `EndpointNotValid` and 404 to `EndpointNotFound`.
fn is_gone_error(error: &web_push::WebPushError) -> bool {
    matches!(
        error,
        web_push::WebPushError::EndpointNotValid | web_push::WebPushError::EndpointNotFound
    )
}

/// Store selected at startup: the hosted REST record store or a local file.
#[derive(Clone)]
pub enum StoreBackend {
    Rest(RestRecordStore),
    File(JsonFileStore),
}

impl SubscriptionStore for StoreBackend {
    fn upsert<'a>(&'a self, subscription: &'a Subscription) -> StoreFuture<'a, ()> {
        match self {
            StoreBackend::Rest(store) => store.upsert(subscription),
            StoreBackend::File(store) => store.upsert(subscription),
        }
    }

    fn list(&self) -> StoreFuture<'_, Vec<Subscription>> {
        match self {
            StoreBackend::Rest(store) => store.list(),
            StoreBackend::File(store) => store.list(),
        }
    }

    fn delete<'a>(&'a self, endpoint: &'a str) -> StoreFuture<'a, ()> {
        match self {
            StoreBackend::Rest(store) => store.delete(endpoint),
            StoreBackend::File(store) => store.delete(endpoint),
        }
    }

    fn record_broadcast<'a>(&'a self, record: &'a BroadcastRecord) -> StoreFuture<'a, ()> {
        match self {
            StoreBackend::Rest(store) => store.record_broadcast(record),
            StoreBackend::File(store) => store.record_broadcast(record),
        }
    }
}

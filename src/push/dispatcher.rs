use crate::ports::{Clock, PushSender, StoreError, SubscriptionStore};
use crate::types::push::{BroadcastRecord, BroadcastSummary, DeliveryOutcome, Subscription};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("{0}")]
    InvalidRequest(&'static str),
    #[error("failed to load subscriptions: {0}")]
    StoreRead(#[source] StoreError),
}

/// Sends one notification to every stored subscription and prunes the
/// subscriptions whose endpoints the push service reports as gone.
#[derive(Debug, Clone)]
pub struct Dispatcher<S, St, C> {
    sender: S,
    store: St,
    clock: C,
    delivery_timeout: Duration,
    record_history: bool,
}

impl<S, St, C> Dispatcher<S, St, C>
where
    S: PushSender,
    St: SubscriptionStore,
    C: Clock,
{
    pub fn new(sender: S, store: St, clock: C, delivery_timeout: Duration) -> Self {
        Self {
            sender,
            store,
            clock,
            delivery_timeout,
            record_history: false,
        }
    }

    pub fn with_history(mut self, record_history: bool) -> Self {
        self.record_history = record_history;
        self
    }

    /// Fans the payload out to all subscriptions and waits for every attempt,
    /// cleanup deletes included, before returning. The send and the cleanup
    /// delete of each subscription are each bounded by the delivery timeout.
    ///
    /// Individual delivery failures are folded into the summary; only blank
    /// input or an unreadable store fail the call. Title and message are sent
    /// exactly as given.
    pub async fn broadcast(
        &self,
        title: &str,
        message: &str,
    ) -> Result<BroadcastSummary, BroadcastError> {
        if title.trim().is_empty() || message.trim().is_empty() {
            return Err(BroadcastError::InvalidRequest(
                "title and message are required.",
            ));
        }

        let subscriptions = self.store.list().await.map_err(BroadcastError::StoreRead)?;
        let payload: Arc<str> = serde_json::json!({
            "title": title,
            "message": message,
        })
        .to_string()
        .into();

        let mut deliveries = JoinSet::new();
        for subscription in subscriptions {
            let sender = self.sender.clone();
            let store = self.store.clone();
            let clock = self.clock.clone();
            let payload = Arc::clone(&payload);
            let timeout = self.delivery_timeout;
            deliveries.spawn(async move {
                deliver(sender, store, clock, timeout, subscription, payload).await
            });
        }

        let mut summary = BroadcastSummary::default();
        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok((outcome, removed)) => summary.record(outcome, removed),
                Err(err) => {
                    warn!(error = %err, "push delivery task failed");
                    summary.record(DeliveryOutcome::TransientFailure, false);
                }
            }
        }

        info!(
            attempted = summary.attempted,
            delivered = summary.delivered,
            failed = summary.failed,
            removed = summary.removed,
            "broadcast finished"
        );

        if self.record_history {
            let record = BroadcastRecord {
                title: title.to_string(),
                message: message.to_string(),
                sent_at: self.clock.now(),
            };
            if let Err(err) = self.store.record_broadcast(&record).await {
                warn!(error = %err, "failed to record broadcast history");
            }
        }

        Ok(summary)
    }
}

/// Returns the outcome and whether the subscription was removed from the store.
async fn deliver<S, St, C>(
    sender: S,
    store: St,
    clock: C,
    timeout: Duration,
    subscription: Subscription,
    payload: Arc<str>,
) -> (DeliveryOutcome, bool)
where
    S: PushSender,
    St: SubscriptionStore,
    C: Clock,
{
    let result = tokio::select! {
        result = sender.send(&subscription, &payload) => Some(result),
        _ = clock.sleep(timeout) => None,
    };

    match result {
        Some(Ok(())) => (DeliveryOutcome::Delivered, false),
        Some(Err(err)) if sender.is_gone(&err) => {
            info!(endpoint = %subscription.endpoint, error = %err, "removing expired subscription");
            let cleanup = tokio::select! {
                result = store.delete(&subscription.endpoint) => Some(result),
                _ = clock.sleep(timeout) => None,
            };
            let removed = match cleanup {
                Some(Ok(())) => true,
                Some(Err(err)) => {
                    warn!(
                        endpoint = %subscription.endpoint,
                        error = %err,
                        "failed to remove expired subscription"
                    );
                    false
                }
                None => {
                    warn!(
                        endpoint = %subscription.endpoint,
                        timeout_ms = timeout.as_millis() as u64,
                        "removing expired subscription timed out"
                    );
                    false
                }
            };
            (DeliveryOutcome::PermanentFailure, removed)
        }
        Some(Err(err)) => {
            warn!(endpoint = %subscription.endpoint, error = %err, "push delivery error");
            (DeliveryOutcome::TransientFailure, false)
        }
        None => {
            warn!(
                endpoint = %subscription.endpoint,
                timeout_ms = timeout.as_millis() as u64,
                "push delivery timed out"
            );
            (DeliveryOutcome::TransientFailure, false)
        }
    }
}

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub private_key: String,
    pub public_key: String,
    pub subject: String,
}

/// A device registration with a push service, keyed by `endpoint`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// What the push service handed back when a device registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

impl Registration {
    pub fn into_subscription(self, created_at: OffsetDateTime) -> Subscription {
        Subscription {
            endpoint: self.endpoint,
            p256dh: self.p256dh,
            auth: self.auth,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastRecord {
    pub title: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Kept in the store; the next broadcast tries again.
    TransientFailure,
    /// The endpoint is gone; the subscription gets deleted.
    PermanentFailure,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub removed: usize,
}

impl BroadcastSummary {
    pub(crate) fn record(&mut self, outcome: DeliveryOutcome, removed: bool) {
        self.attempted += 1;
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::TransientFailure | DeliveryOutcome::PermanentFailure => {
                self.failed += 1
            }
        }
        if removed {
            self.removed += 1;
        }
    }
}

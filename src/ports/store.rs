use std::pin::Pin;

use crate::types::push::{BroadcastRecord, Subscription};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),
    #[error("store rejected request (status {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("store returned malformed data: {0}")]
    Decode(String),
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// The shared record store both the registrar and the dispatcher talk to.
///
/// Implementations must make `upsert` atomic per endpoint and `delete`
/// idempotent; callers never hold a lock around either.
pub trait SubscriptionStore: Clone + Send + Sync + 'static {
    fn upsert<'a>(&'a self, subscription: &'a Subscription) -> StoreFuture<'a, ()>;
    fn list(&self) -> StoreFuture<'_, Vec<Subscription>>;
    fn delete<'a>(&'a self, endpoint: &'a str) -> StoreFuture<'a, ()>;
    fn record_broadcast<'a>(&'a self, record: &'a BroadcastRecord) -> StoreFuture<'a, ()>;
}

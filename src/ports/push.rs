use crate::types::push::Subscription;

/// Encrypts and hands one payload to the push service behind a subscription.
pub trait PushSender: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn send<'a>(&'a self, subscription: &'a Subscription, payload: &'a str) -> Self::Fut<'a>;

    /// True when the push service reported the endpoint as permanently gone
    /// (HTTP 404 or 410).
    fn is_gone(&self, error: &Self::Error) -> bool;
}

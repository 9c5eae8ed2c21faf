use std::time::Duration;

use time::OffsetDateTime;

/// Wall clock and timer source, swapped out in tests to drive timeouts by hand.
pub trait Clock: Clone + Send + Sync + 'static {
    type Sleep<'a>: Future<Output = ()> + Send + 'a
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime;
    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a>;
}

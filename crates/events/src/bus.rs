//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes events that a pool has already committed to its
//! journal. It is transport-agnostic and makes no storage assumptions: the
//! journal is the source of truth, the bus only fans committed facts out to
//! observers (read models, audit sinks, notification workers).
//!
//! Delivery is at-least-once; consumers must be idempotent. Sequence numbers
//! in `EventEnvelope` let consumers drop duplicates.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of every message published after it was
/// created (broadcast semantics). Intended for single-threaded consumption.
///
/// ```ignore
/// let subscription = bus.subscribe();
/// service.mint(account, amount)?;
/// for envelope in subscription.drain() {
///     read_model.apply(envelope.payload());
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain every message currently buffered without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// ```text
/// Operation → Pool journal (append) → Event Bus (publish) → Consumers
/// ```
///
/// `publish()` can fail; the publisher decides what a failure means. Pools
/// treat publication as best-effort because the journal already holds the
/// event.
///
/// Implementations must be `Send + Sync`; multiple threads may publish
/// concurrently.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

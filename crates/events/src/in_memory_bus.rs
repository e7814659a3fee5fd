//! In-memory broadcast bus for tests, benches and single-process setups.

use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    #[error("event bus lock poisoned")]
    Poisoned,
}

/// Fan-out bus backed by one `mpsc` channel per subscriber.
///
/// Publishing never blocks on consumers. A subscriber whose `Subscription`
/// was dropped is pruned on the next publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscriptions still registered (pruning happens on publish).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryBusError::Poisoned)?;

        let Some((last, rest)) = subscribers.split_last() else {
            return Ok(());
        };
        let mut live: Vec<bool> = rest
            .iter()
            .map(|tx| tx.send(message.clone()).is_ok())
            .collect();
        // The last subscriber receives the message itself, not a clone.
        live.push(last.send(message).is_ok());

        let mut flags = live.into_iter();
        subscribers.retain(|_| flags.next().unwrap_or(false));
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        // A poisoned lock still yields a subscription; it just never receives.
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        Subscription::new(rx)
    }
}

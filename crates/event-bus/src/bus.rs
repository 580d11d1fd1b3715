use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::errors::BusError;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), BusError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-memory broadcast bus used to fan frontend messages out to subscribers.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    /// Publishes without awaiting; returns the number of receivers reached.
    pub fn send(&self, event: E) -> Result<usize, BusError> {
        self.sender.send(event).map_err(|_| BusError::NoSubscribers)
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), BusError> {
        self.send(event).map(|_| ())
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let bus = InMemoryBus::<String>::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        bus.publish("hello".to_string()).await.unwrap();
        assert_eq!(first.recv().await.as_deref(), Ok("hello"));
        assert_eq!(second.recv().await.as_deref(), Ok("hello"));
        assert_eq!(bus.receiver_count(), 2);
    }

    #[test]
    fn send_without_subscribers_fails() {
        let bus = InMemoryBus::<u32>::new(1);
        assert_eq!(bus.send(1), Err(BusError::NoSubscribers));
    }
}

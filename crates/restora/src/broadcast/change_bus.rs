//! Generic fan-out channel shared by cloned handles.

use std::sync::Arc;

use tokio::sync::broadcast;

/// Broadcasts change events to every subscriber.
///
/// Clones share the same underlying channel, so a mutation published through
/// one handle reaches receivers created from any other.
#[derive(Debug)]
pub struct ChangeBus<T: Clone> {
    sender: Arc<broadcast::Sender<T>>,
}

impl<T: Clone> Clone for ChangeBus<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T: Clone> ChangeBus<T> {
    /// Creates a new bus with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: T) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for ChangeBus<T> {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_receive() {
        let bus: ChangeBus<u32> = ChangeBus::new(8);
        let mut rx = bus.subscribe();
        bus.send(7);
        assert_eq!(rx.try_recv().unwrap(), 7);
    }

    #[test]
    fn test_clones_share_channel() {
        let bus: ChangeBus<&'static str> = ChangeBus::default();
        let other = bus.clone();
        let mut rx = other.subscribe();

        bus.send("hello");
        assert_eq!(rx.try_recv().unwrap(), "hello");
        assert_eq!(bus.receiver_count(), 1);
    }

    #[test]
    fn test_send_without_receivers() {
        let bus: ChangeBus<u8> = ChangeBus::new(1);
        bus.send(1);
        assert_eq!(bus.receiver_count(), 0);
    }
}

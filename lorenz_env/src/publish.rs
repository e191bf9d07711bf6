//! Broadcast transport abstraction and an in-process bus.

use crate::error::TransportError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Publisher side of a one-to-many broadcast channel.
///
/// # Semantics
///
/// - `bind` happens once per publisher; a second publisher on the same
///   address fails with [`TransportError::AddressInUse`].
/// - `send` is fire-and-forget: no acknowledgment, no waiting for slow
///   subscribers, and no error when nobody is listening.
/// - `close` releases the address and is a no-op on an unbound socket.
pub trait PublishSocket: Send + 'static {
    fn bind(&mut self, address: &str) -> Result<(), TransportError>;

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    fn close(&mut self);

    fn is_bound(&self) -> bool;
}

/// Per-address channel inside a [`LocalBus`].
struct Channel {
    sender: broadcast::Sender<Vec<u8>>,
    bound: bool,
}

/// In-process broadcast registry keyed by address.
///
/// Subscribers may join before or after the publisher binds; frames sent
/// before a subscriber joins are never delivered to it.
#[derive(Clone)]
pub struct LocalBus {
    channels: Arc<Mutex<HashMap<String, Channel>>>,

    /// Per-subscriber buffer; slow subscribers lose the oldest frames
    buffer: usize,
}

impl LocalBus {
    /// Default per-subscriber buffer depth.
    pub const DEFAULT_BUFFER: usize = 1024;

    pub fn new() -> Self {
        Self::with_buffer(Self::DEFAULT_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            buffer: buffer.max(1),
        }
    }

    /// Creates an unbound publisher attached to this bus.
    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            bus: self.clone(),
            bound: None,
        }
    }

    /// Joins the channel at `address`, creating it if nobody bound yet.
    pub fn subscribe(&self, address: &str) -> BusSubscriber {
        let mut channels = lock(&self.channels);
        let channel = channels
            .entry(address.to_string())
            .or_insert_with(|| Channel {
                sender: broadcast::channel(self.buffer).0,
                bound: false,
            });
        BusSubscriber {
            rx: channel.sender.subscribe(),
        }
    }

    /// True while a publisher owns `address`.
    pub fn is_bound(&self, address: &str) -> bool {
        lock(&self.channels).get(address).map(|c| c.bound).unwrap_or(false)
    }

    fn claim(&self, address: &str) -> Result<broadcast::Sender<Vec<u8>>, TransportError> {
        let mut channels = lock(&self.channels);
        let channel = channels
            .entry(address.to_string())
            .or_insert_with(|| Channel {
                sender: broadcast::channel(self.buffer).0,
                bound: false,
            });

        if channel.bound {
            return Err(TransportError::AddressInUse(address.to_string()));
        }
        channel.bound = true;
        Ok(channel.sender.clone())
    }

    fn release(&self, address: &str) {
        if let Some(channel) = lock(&self.channels).get_mut(address) {
            channel.bound = false;
        }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

// The registry holds no invariants a panicking holder could break
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Publisher bound to a [`LocalBus`] address.
pub struct BusPublisher {
    bus: LocalBus,
    bound: Option<(String, broadcast::Sender<Vec<u8>>)>,
}

impl BusPublisher {
    /// Address this publisher owns, if bound.
    pub fn address(&self) -> Option<&str> {
        self.bound.as_ref().map(|(address, _)| address.as_str())
    }
}

impl PublishSocket for BusPublisher {
    fn bind(&mut self, address: &str) -> Result<(), TransportError> {
        if self.bound.is_some() {
            return Err(TransportError::bind(address, "publisher already bound"));
        }
        let sender = self.bus.claim(address)?;
        self.bound = Some((address.to_string(), sender));
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let (_, sender) = self.bound.as_ref().ok_or(TransportError::NotBound)?;
        // Err here only means there are no subscribers; the frame is dropped
        let _ = sender.send(payload.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        if let Some((address, _)) = self.bound.take() {
            self.bus.release(&address);
        }
    }

    fn is_bound(&self) -> bool {
        self.bound.is_some()
    }
}

impl Drop for BusPublisher {
    fn drop(&mut self) {
        self.close();
    }
}

/// Subscriber side of a [`LocalBus`] channel.
pub struct BusSubscriber {
    rx: broadcast::Receiver<Vec<u8>>,
}

impl BusSubscriber {
    /// Waits for the next message.
    ///
    /// Returns `None` once the bus and every publisher are gone. Messages
    /// lost to lag are skipped silently.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "bus subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Takes the next message if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.rx.try_recv() {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "tcp://127.0.0.1:5555";

    #[test]
    fn test_second_bind_fails_loudly() {
        let bus = LocalBus::new();
        let mut first = bus.publisher();
        let mut second = bus.publisher();

        first.bind(ADDR).unwrap();
        assert_eq!(
            second.bind(ADDR).unwrap_err(),
            TransportError::AddressInUse(ADDR.to_string())
        );
        assert!(!second.is_bound());
    }

    #[test]
    fn test_close_releases_address() {
        let bus = LocalBus::new();
        let mut first = bus.publisher();
        first.bind(ADDR).unwrap();
        assert!(bus.is_bound(ADDR));

        first.close();
        assert!(!bus.is_bound(ADDR));

        let mut second = bus.publisher();
        assert!(second.bind(ADDR).is_ok());
    }

    #[test]
    fn test_close_unbound_is_noop() {
        let bus = LocalBus::new();
        let mut publisher = bus.publisher();
        publisher.close();
        publisher.close();
        assert!(!publisher.is_bound());
    }

    #[test]
    fn test_send_requires_bind() {
        let bus = LocalBus::new();
        let mut publisher = bus.publisher();
        assert_eq!(publisher.send(&[1, 2, 3]).unwrap_err(), TransportError::NotBound);
    }

    #[test]
    fn test_send_without_subscribers_is_ok() {
        let bus = LocalBus::new();
        let mut publisher = bus.publisher();
        publisher.bind(ADDR).unwrap();
        assert!(publisher.send(&[0u8; 8]).is_ok());
    }

    #[test]
    fn test_late_subscriber_misses_earlier_frames() {
        let bus = LocalBus::new();
        let mut early = bus.subscribe(ADDR);
        let mut publisher = bus.publisher();
        publisher.bind(ADDR).unwrap();

        publisher.send(&[1]).unwrap();
        let mut late = bus.subscribe(ADDR);
        publisher.send(&[2]).unwrap();

        assert_eq!(early.try_recv(), Some(vec![1]));
        assert_eq!(early.try_recv(), Some(vec![2]));
        assert_eq!(late.try_recv(), Some(vec![2]));
        assert_eq!(late.try_recv(), None);
    }

    #[tokio::test]
    async fn test_fan_out() {
        let bus = LocalBus::new();
        let mut a = bus.subscribe(ADDR);
        let mut b = bus.subscribe(ADDR);
        let mut publisher = bus.publisher();
        publisher.bind(ADDR).unwrap();

        publisher.send(&[9, 9]).unwrap();
        assert_eq!(a.recv().await, Some(vec![9, 9]));
        assert_eq!(b.recv().await, Some(vec![9, 9]));
    }
}

//! Work queue abstraction for the edges between pipeline stages.

use crate::error::QueueError;
use crate::types::WorkItem;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A bounded edge carrying [`WorkItem`]s from one stage to the next.
///
/// ```text
/// Generator                  WorkQueue                  Processor
///   |                           |                          |
///   |-- enqueue(item) --------->|                          |
///   |   (never waits)           |<-- dequeue(timeout) -----|
///   |                           |-- item / Timeout ------->|
/// ```
#[async_trait]
pub trait WorkQueue: Send + Sync + 'static {
    /// Enqueues without waiting.
    ///
    /// # Returns
    /// * `Err(QueueError::Full)` - The queue is at capacity
    /// * `Err(QueueError::Closed)` - The edge was closed
    fn enqueue(&self, item: WorkItem) -> Result<(), QueueError>;

    /// Dequeues, waiting at most `timeout`.
    ///
    /// A zero timeout only takes what is already queued.
    ///
    /// # Returns
    /// * `Err(QueueError::Timeout)` - Nothing arrived in time
    /// * `Err(QueueError::Closed)` - The edge was closed
    async fn dequeue(&self, timeout: Duration) -> Result<WorkItem, QueueError>;
}

/// Channel-backed queue. Safe for concurrent enqueue from several producers.
pub struct ChannelQueue {
    tx: mpsc::Sender<WorkItem>,

    /// Receiver behind a tokio mutex so `dequeue` can take `&self`
    rx: tokio::sync::Mutex<mpsc::Receiver<WorkItem>>,

    capacity: usize,

    closed: AtomicBool,
}

impl ChannelQueue {
    /// Creates a queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    /// Creates an Arc-wrapped queue for sharing between two actors.
    pub fn shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    /// Closes the edge. Both ends fail with `Closed` afterwards.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of items waiting.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WorkQueue for ChannelQueue {
    fn enqueue(&self, item: WorkItem) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full(self.capacity),
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    async fn dequeue(&self, timeout: Duration) -> Result<WorkItem, QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        let timeout_ms = timeout.as_millis() as u64;
        let mut rx = self.rx.lock().await;

        if timeout.is_zero() {
            return rx.try_recv().map_err(|e| match e {
                mpsc::error::TryRecvError::Empty => QueueError::Timeout(0),
                mpsc::error::TryRecvError::Disconnected => QueueError::Closed,
            });
        }

        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(item)) => Ok(item),
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Err(QueueError::Timeout(timeout_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Handle;

    fn item(tag: u64) -> WorkItem {
        WorkItem::new(Handle::new(format!("item {}", tag)), tag)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = ChannelQueue::new(4);
        queue.enqueue(item(0)).unwrap();
        queue.enqueue(item(1)).unwrap();
        assert_eq!(queue.len(), 2);

        let timeout = Duration::from_millis(10);
        assert_eq!(queue.dequeue(timeout).await.unwrap().sequence_tag, 0);
        assert_eq!(queue.dequeue(timeout).await.unwrap().sequence_tag, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_empty_queue_times_out() {
        let queue = ChannelQueue::new(1);
        let err = queue.dequeue(Duration::from_millis(5)).await.unwrap_err();
        assert_eq!(err, QueueError::Timeout(5));
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_zero_timeout_takes_ready_item() {
        let queue = ChannelQueue::new(1);
        assert!(queue.dequeue(Duration::ZERO).await.unwrap_err().is_timeout());

        queue.enqueue(item(7)).unwrap();
        assert_eq!(queue.dequeue(Duration::ZERO).await.unwrap().sequence_tag, 7);
    }

    #[test]
    fn test_full_queue_rejects_without_waiting() {
        let queue = ChannelQueue::new(1);
        queue.enqueue(item(0)).unwrap();
        assert_eq!(queue.enqueue(item(1)).unwrap_err(), QueueError::Full(1));
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let queue = ChannelQueue::new(2);
        queue.enqueue(item(0)).unwrap();
        queue.close();

        assert_eq!(queue.enqueue(item(1)).unwrap_err(), QueueError::Closed);
        assert_eq!(
            queue.dequeue(Duration::from_millis(5)).await.unwrap_err(),
            QueueError::Closed
        );
    }

    #[tokio::test]
    async fn test_concurrent_producers() {
        let queue = ChannelQueue::shared(16);
        let mut tasks = Vec::new();
        for producer in 0..4u64 {
            let q = queue.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..4u64 {
                    q.enqueue(item(producer * 10 + i)).unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(queue.len(), 16);
    }
}

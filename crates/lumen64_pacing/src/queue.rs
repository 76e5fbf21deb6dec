//! Bounded FIFO hand-off between threads.
//!
//! A full queue blocks the producer. It never drops an item. How long the
//! producer waited is reported so the pacer can detect sustained
//! backpressure.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};

/// How a push completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// There was room.
    Immediate,
    /// The queue was full; the producer waited less than the stall threshold.
    Waited(Duration),
    /// The producer waited past the stall threshold.
    Stalled(Duration),
}

impl PushOutcome {
    /// True for [`PushOutcome::Stalled`].
    #[must_use]
    pub const fn is_stall(self) -> bool {
        matches!(self, Self::Stalled(_))
    }
}

/// Producer end.
#[derive(Debug)]
pub struct QueueSender<T> {
    tx: Sender<T>,
    stall_after: Duration,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone(), stall_after: self.stall_after }
    }
}

/// Consumer end.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    rx: Receiver<T>,
}

/// Creates a queue holding at most `depth` items (minimum 1).
#[must_use]
pub fn bounded_queue<T>(depth: usize, stall_after: Duration) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = bounded(depth.max(1));
    (QueueSender { tx, stall_after }, QueueReceiver { rx })
}

impl<T> QueueSender<T> {
    /// Enqueues, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns the item when the consumer is gone.
    pub fn push(&self, item: T) -> Result<PushOutcome, T> {
        let item = match self.tx.try_send(item) {
            Ok(()) => return Ok(PushOutcome::Immediate),
            Err(TrySendError::Disconnected(item)) => return Err(item),
            Err(TrySendError::Full(item)) => item,
        };

        let started = Instant::now();
        let item = match self.tx.send_timeout(item, self.stall_after) {
            Ok(()) => return Ok(PushOutcome::Waited(started.elapsed())),
            Err(SendTimeoutError::Disconnected(item)) => return Err(item),
            Err(SendTimeoutError::Timeout(item)) => item,
        };

        match self.tx.send(item) {
            Ok(()) => Ok(PushOutcome::Stalled(started.elapsed())),
            Err(err) => Err(err.into_inner()),
        }
    }

    /// Items waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// True when nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Queue depth.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(1)
    }
}

impl<T> QueueReceiver<T> {
    /// Dequeues, blocking while empty. `None` once every producer is gone
    /// and the queue is drained.
    #[must_use]
    pub fn pop(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Dequeues without blocking.
    #[must_use]
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Items waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True when nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Iterator for QueueReceiver<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_push_pop_fifo() {
        let (tx, rx) = bounded_queue(3, Duration::from_millis(50));
        for i in 0..3 {
            assert_eq!(tx.push(i), Ok(PushOutcome::Immediate));
        }
        assert_eq!(tx.len(), 3);
        assert_eq!(rx.pop(), Some(0));
        assert_eq!(rx.pop(), Some(1));
        assert_eq!(rx.pop(), Some(2));
    }

    #[test]
    fn test_full_queue_blocks_instead_of_dropping() {
        let (tx, rx) = bounded_queue(1, Duration::from_millis(5));
        tx.push(0).unwrap();
        let consumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(40));
            rx.collect::<Vec<_>>()
        });
        let outcome = tx.push(1).unwrap();
        assert!(outcome.is_stall());
        drop(tx);
        assert_eq!(consumer.join().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_disconnected_returns_item() {
        let (tx, rx) = bounded_queue::<u32>(1, Duration::from_millis(5));
        drop(rx);
        assert_eq!(tx.push(9), Err(9));
    }

    #[test]
    fn test_depth_is_at_least_one() {
        let (tx, _rx) = bounded_queue::<u8>(0, Duration::from_millis(1));
        assert_eq!(tx.capacity(), 1);
    }
}

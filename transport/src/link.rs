//! The `Link` abstraction and the inbound queue shared by implementations.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::error::{TransportError, TransportResult};

/// A reliable, ordered, message-framed connection to one peer.
///
/// `send` never blocks on the network. `receive` blocks until a frame
/// arrives, the peer goes away, or [`Link::close`] is called from any thread.
pub trait Link: Send + Sync {
    /// Queues a frame payload for delivery.
    fn send(&self, payload: &[u8]) -> TransportResult<()>;

    /// Pops the next received payload without blocking.
    fn try_receive(&self) -> TransportResult<Option<Vec<u8>>>;

    /// Blocks until the next payload is available.
    fn receive(&self) -> TransportResult<Vec<u8>>;

    /// Closes the link. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;

    /// Human-readable peer description for logs.
    fn peer(&self) -> &str;
}

/// Item carried on an inbound queue. An `Err` always ends the stream.
pub(crate) type Inbound = TransportResult<Vec<u8>>;

/// Receiving half of a link.
///
/// Keeps its own sender so a local close can wake a blocked `receive`.
#[derive(Debug)]
pub(crate) struct Inbox {
    rx: Receiver<Inbound>,
    wake: Sender<Inbound>,
    closed: AtomicBool,
}

impl Inbox {
    /// Creates an inbox and the sender the producing side writes into.
    pub(crate) fn new() -> (Self, Sender<Inbound>) {
        let (tx, rx) = unbounded();
        let inbox = Self {
            rx,
            wake: tx.clone(),
            closed: AtomicBool::new(false),
        };
        (inbox, tx)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the inbox closed. Returns `true` only for the first call.
    pub(crate) fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            let _ = self.wake.send(Err(TransportError::Disconnected));
        }
        first
    }

    pub(crate) fn try_receive(&self) -> TransportResult<Option<Vec<u8>>> {
        if self.is_closed() {
            return Err(TransportError::Disconnected);
        }
        match self.rx.try_recv() {
            Ok(item) => self.settle(item).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => self.settle(Err(TransportError::Disconnected)).map(Some),
        }
    }

    pub(crate) fn receive(&self) -> TransportResult<Vec<u8>> {
        if self.is_closed() {
            return Err(TransportError::Disconnected);
        }
        let item = self
            .rx
            .recv()
            .unwrap_or(Err(TransportError::Disconnected));
        self.settle(item)
    }

    fn settle(&self, item: Inbound) -> Inbound {
        if item.is_err() {
            self.closed.store(true, Ordering::Release);
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_arrive_in_order() {
        let (inbox, tx) = Inbox::new();
        tx.send(Ok(vec![1])).unwrap();
        tx.send(Ok(vec![2])).unwrap();
        assert_eq!(inbox.try_receive().unwrap(), Some(vec![1]));
        assert_eq!(inbox.receive().unwrap(), vec![2]);
        assert_eq!(inbox.try_receive().unwrap(), None);
    }

    #[test]
    fn error_closes_inbox() {
        let (inbox, tx) = Inbox::new();
        tx.send(Err(TransportError::Disconnected)).unwrap();
        tx.send(Ok(vec![1])).unwrap();
        assert_eq!(inbox.receive(), Err(TransportError::Disconnected));
        assert!(inbox.is_closed());
        assert_eq!(inbox.try_receive(), Err(TransportError::Disconnected));
    }

    #[test]
    fn close_is_reported_once() {
        let (inbox, _tx) = Inbox::new();
        assert!(inbox.close());
        assert!(!inbox.close());
        assert_eq!(inbox.receive(), Err(TransportError::Disconnected));
    }
}

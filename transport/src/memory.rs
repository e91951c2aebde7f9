//! In-process links.

use crossbeam_channel::Sender;
use log::debug;
use wire::{EncodeError, LimitKind, Limits};

use crate::error::{TransportError, TransportResult};
use crate::link::{Inbound, Inbox, Link};

/// One end of an in-memory link pair.
///
/// Behaves like a [`crate::TcpLink`] without a socket: ordered delivery,
/// non-blocking send, and close on either end is seen by the other as
/// [`TransportError::Disconnected`].
#[derive(Debug)]
pub struct MemoryLink {
    inbox: Inbox,
    peer_tx: Sender<Inbound>,
    peer: String,
    limits: Limits,
}

impl MemoryLink {
    /// Creates two connected ends.
    #[must_use]
    pub fn pair(limits: Limits) -> (Self, Self) {
        let (inbox_a, tx_a) = Inbox::new();
        let (inbox_b, tx_b) = Inbox::new();
        let a = Self {
            inbox: inbox_a,
            peer_tx: tx_b,
            peer: "memory:b".to_owned(),
            limits,
        };
        let b = Self {
            inbox: inbox_b,
            peer_tx: tx_a,
            peer: "memory:a".to_owned(),
            limits,
        };
        (a, b)
    }
}

impl Link for MemoryLink {
    fn send(&self, payload: &[u8]) -> TransportResult<()> {
        if self.inbox.is_closed() {
            return Err(TransportError::Disconnected);
        }
        if payload.len() > self.limits.max_frame_bytes {
            return Err(EncodeError::LimitsExceeded {
                kind: LimitKind::FrameBytes,
                limit: self.limits.max_frame_bytes,
                actual: payload.len(),
            }
            .into());
        }
        self.peer_tx
            .send(Ok(payload.to_vec()))
            .map_err(|_| TransportError::Disconnected)
    }

    fn try_receive(&self) -> TransportResult<Option<Vec<u8>>> {
        self.inbox.try_receive()
    }

    fn receive(&self) -> TransportResult<Vec<u8>> {
        self.inbox.receive()
    }

    fn close(&self) {
        if self.inbox.close() {
            debug!("closing link to `{}`", self.peer);
            let _ = self.peer_tx.send(Err(TransportError::Disconnected));
        }
    }

    fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

impl Drop for MemoryLink {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pair_send_receive() {
        let (a, b) = MemoryLink::pair(Limits::for_testing());
        a.send(b"ping").unwrap();
        b.send(b"pong").unwrap();
        assert_eq!(b.receive().unwrap(), b"ping");
        assert_eq!(a.try_receive().unwrap(), Some(b"pong".to_vec()));
        assert_eq!(a.try_receive().unwrap(), None);
    }

    #[test]
    fn frames_before_close_are_delivered() {
        let (a, b) = MemoryLink::pair(Limits::for_testing());
        a.send(b"bye").unwrap();
        a.close();
        assert_eq!(b.receive().unwrap(), b"bye");
        assert_eq!(b.receive(), Err(TransportError::Disconnected));
    }

    #[test]
    fn drop_disconnects_peer() {
        let (a, b) = MemoryLink::pair(Limits::for_testing());
        drop(a);
        assert_eq!(b.try_receive(), Err(TransportError::Disconnected));
        assert_eq!(b.send(b"x"), Err(TransportError::Disconnected));
    }

    #[test]
    fn close_unblocks_receive() {
        let (a, _b) = MemoryLink::pair(Limits::for_testing());
        let a = Arc::new(a);
        let waiter = {
            let a = Arc::clone(&a);
            thread::spawn(move || a.receive())
        };
        thread::sleep(Duration::from_millis(20));
        a.close();
        assert_eq!(waiter.join().unwrap(), Err(TransportError::Disconnected));
    }

    #[test]
    fn oversized_payload_rejected() {
        let (a, _b) = MemoryLink::pair(Limits::for_testing());
        let big = vec![0u8; Limits::for_testing().max_frame_bytes + 1];
        assert!(matches!(a.send(&big), Err(TransportError::Encode(_))));
        assert!(!a.is_closed());
    }
}

//! Reliable, ordered, framed links for mpnet.
//!
//! A [`Link`] carries whole frame payloads between two peers. Two
//! implementations are provided:
//!
//! - [`TcpLink`]: length-prefixed frames over TCP, with a reader and a
//!   writer thread per link feeding crossbeam channels.
//! - [`MemoryLink`]: an in-process pair for tests and local play.
//!
//! The simulation thread never blocks on either: `send` queues, and
//! `try_receive` drains what the reader has already decoded.

mod error;
mod link;
mod memory;
mod tcp;

pub use error::{TransportError, TransportResult};
pub use link::Link;
pub use memory::MemoryLink;
pub use tcp::{connect, Acceptor, Listener, TcpLink};

//! TCP links.
//!
//! Each link owns two threads: a reader that decodes frames off the socket
//! into the inbox, and a writer that drains the outbound queue. Sending only
//! pushes onto that queue, so a slow peer never stalls the simulation.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, trace, warn};
use wire::{encode_frame, FrameDecoder, Limits};

use crate::error::{TransportError, TransportResult};
use crate::link::{Inbound, Inbox, Link};

const READ_CHUNK: usize = 4096;

#[derive(Debug)]
enum Outbound {
    Frame(Vec<u8>),
    /// Flush everything queued before this, then shut the socket down.
    Close,
}

/// A framed link over a `TcpStream`.
#[derive(Debug)]
pub struct TcpLink {
    inbox: Inbox,
    outbound: Sender<Outbound>,
    stream: TcpStream,
    peer: String,
    limits: Limits,
}

impl TcpLink {
    /// Wraps a connected stream and starts its reader and writer threads.
    pub fn from_stream(stream: TcpStream, limits: Limits) -> TransportResult<Self> {
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_owned(), |addr| addr.to_string());
        let reader = stream.try_clone()?;
        let writer = stream.try_clone()?;

        let (inbox, inbound) = Inbox::new();
        let (outbound, queued) = unbounded();

        let read_peer = peer.clone();
        thread::Builder::new()
            .name(format!("mpnet-read {peer}"))
            .spawn(move || read_loop(reader, limits, &inbound, &read_peer))?;
        let write_peer = peer.clone();
        thread::Builder::new()
            .name(format!("mpnet-write {peer}"))
            .spawn(move || write_loop(writer, &queued, &write_peer))?;

        debug!("link to `{peer}` established");
        Ok(Self {
            inbox,
            outbound,
            stream,
            peer,
            limits,
        })
    }
}

impl Link for TcpLink {
    fn send(&self, payload: &[u8]) -> TransportResult<()> {
        if self.inbox.is_closed() {
            return Err(TransportError::Disconnected);
        }
        let frame = encode_frame(payload, &self.limits)?;
        trace!("queue {} bytes for `{}`", frame.len(), self.peer);
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::Disconnected)
    }

    fn try_receive(&self) -> TransportResult<Option<Vec<u8>>> {
        self.inbox.try_receive()
    }

    fn receive(&self) -> TransportResult<Vec<u8>> {
        self.inbox.receive()
    }

    fn close(&self) {
        if !self.inbox.close() {
            return;
        }
        debug!("closing link to `{}`", self.peer);
        // Stops the reader now; the writer shuts the write half once the
        // queue ahead of `Close` is flushed.
        let _ = self.stream.shutdown(Shutdown::Read);
        if self.outbound.send(Outbound::Close).is_err() {
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }

    fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop(mut stream: TcpStream, limits: Limits, inbound: &Sender<Inbound>, peer: &str) {
    let mut decoder = FrameDecoder::new(limits);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => {
                debug!("`{peer}` closed the connection");
                let _ = inbound.send(Err(TransportError::Disconnected));
                return;
            }
            Ok(read) => {
                decoder.push(&chunk[..read]);
                loop {
                    match decoder.next_frame() {
                        Ok(Some(payload)) => {
                            if inbound.send(Ok(payload)).is_err() {
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            warn!("dropping `{peer}` after malformed frame: {err}");
                            let _ = stream.shutdown(Shutdown::Both);
                            let _ = inbound.send(Err(TransportError::Malformed(err)));
                            return;
                        }
                    }
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                debug!("read from `{peer}` failed: {err}");
                let _ = inbound.send(Err(TransportError::Disconnected));
                return;
            }
        }
    }
}

fn write_loop(mut stream: TcpStream, queued: &Receiver<Outbound>, peer: &str) {
    for item in queued {
        match item {
            Outbound::Frame(frame) => {
                if let Err(err) = stream.write_all(&frame) {
                    debug!("write to `{peer}` failed: {err}");
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = stream.flush();
    let _ = stream.shutdown(Shutdown::Both);
}

/// Opens a link to `addr`.
///
/// Refused or unreachable addresses map to [`TransportError::Connect`].
pub fn connect(addr: &str, limits: Limits) -> TransportResult<TcpLink> {
    let stream = TcpStream::connect(addr).map_err(|err| TransportError::Connect {
        addr: addr.to_owned(),
        kind: err.kind(),
    })?;
    TcpLink::from_stream(stream, limits)
}

/// A bound TCP listener producing [`TcpLink`]s.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    limits: Limits,
}

impl Listener {
    pub fn bind(addr: impl ToSocketAddrs, limits: Limits) -> TransportResult<Self> {
        let inner = TcpListener::bind(addr)?;
        Ok(Self { inner, limits })
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Blocks until the next peer connects.
    pub fn accept(&self) -> TransportResult<TcpLink> {
        let (stream, addr) = self.inner.accept()?;
        debug!("accepted connection from `{addr}`");
        TcpLink::from_stream(stream, self.limits)
    }

    /// Moves the accept loop onto its own thread.
    ///
    /// Failed accepts are logged and skipped. The thread exits after the
    /// first accept that finds the returned [`Acceptor`] dropped.
    pub fn spawn_acceptor(self) -> TransportResult<Acceptor> {
        let local_addr = self.local_addr()?;
        let (tx, links) = unbounded();
        thread::Builder::new()
            .name(format!("mpnet-accept {local_addr}"))
            .spawn(move || loop {
                match self.accept() {
                    Ok(link) => {
                        if tx.send(link).is_err() {
                            return;
                        }
                    }
                    Err(err) => warn!("accept on `{local_addr}` failed: {err}"),
                }
            })?;
        Ok(Acceptor { links, local_addr })
    }
}

/// Receiving end of a background accept loop.
#[derive(Debug)]
pub struct Acceptor {
    links: Receiver<TcpLink>,
    local_addr: SocketAddr,
}

impl Acceptor {
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a newly accepted link, if any.
    pub fn try_accept(&self) -> Option<TcpLink> {
        self.links.try_recv().ok()
    }

    /// Blocks until a link is accepted.
    pub fn accept(&self) -> TransportResult<TcpLink> {
        self.links.recv().map_err(|_| TransportError::Disconnected)
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Non-blocking transport abstraction.
//!
//! The protocol servers never block on I/O: a listener yields zero-or-one
//! pending connection per poll, and a connection answers "how many bytes
//! moved right now" for reads and writes. Two implementations are provided:
//!
//! - [`tcp`]: std TCP sockets switched to non-blocking mode
//! - [`mem`]: an in-memory pair for tests, with a peer handle that scripts
//!   the client side
//!
//! Connection identity ([`ConnId`]) exists so the pool can refuse to bind a
//! connection that is already owned by a slot.

use std::fmt;

use crate::error::TransportError;

// =============================================================================
// Traits
// =============================================================================

/// Identity of an accepted connection, unique per listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One accepted stream connection.
///
/// All operations are non-blocking: reads and writes move whatever bytes
/// are available immediately and report `Ok(0)` when nothing can move.
pub trait Connection {
    /// Identity of this connection for pool-level de-duplication.
    fn id(&self) -> ConnId;

    /// Returns `true` while no disconnect has been observed.
    ///
    /// Disconnects surface through failed reads/writes; this reflects what
    /// has been observed so far, not a live probe.
    fn is_connected(&self) -> bool;

    /// Reads available bytes into `buf` without blocking.
    ///
    /// Returns `Ok(0)` when no bytes are available right now.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] once the peer has disconnected, or
    /// [`TransportError::Io`] on a socket fault.
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Writes as much of `buf` as the transport accepts without blocking.
    ///
    /// Returns `Ok(0)` when the transport cannot take bytes right now.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] or [`TransportError::Io`] as for reads.
    fn try_write(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    /// Closes the connection. Idempotent.
    fn close(&mut self);
}

/// A listening socket polled for pending connections.
pub trait Listener {
    /// The connection type this listener yields.
    type Conn: Connection;

    /// Polls for a pending connection; yields at most one per call.
    ///
    /// # Errors
    ///
    /// [`TransportError::Io`] on a listener fault. `Ok(None)` when nothing
    /// is pending.
    fn poll_accept(&mut self) -> Result<Option<Self::Conn>, TransportError>;
}

// =============================================================================
// TCP implementation
// =============================================================================

/// Non-blocking TCP transport over std sockets.
pub mod tcp {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

    use tracing::{debug, warn};

    use super::{ConnId, Connection, Listener};
    use crate::error::TransportError;

    /// A TCP listener in non-blocking mode.
    pub struct TcpListener {
        inner: std::net::TcpListener,
        next_id: u64,
    }

    impl TcpListener {
        /// Binds to `addr` and switches the socket to non-blocking mode.
        ///
        /// # Errors
        ///
        /// [`TransportError::Io`] if binding fails.
        pub fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
            let inner = std::net::TcpListener::bind(addr)?;
            inner.set_nonblocking(true)?;
            Ok(Self { inner, next_id: 0 })
        }

        /// The bound local address.
        pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
            Ok(self.inner.local_addr()?)
        }
    }

    impl Listener for TcpListener {
        type Conn = TcpConnection;

        fn poll_accept(&mut self) -> Result<Option<TcpConnection>, TransportError> {
            match self.inner.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(true)?;
                    let id = ConnId(self.next_id);
                    self.next_id += 1;
                    debug!(conn = %id, %peer, "accepted connection");
                    Ok(Some(TcpConnection {
                        id,
                        stream,
                        connected: true,
                    }))
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
                Err(e) => Err(TransportError::Io(e)),
            }
        }
    }

    /// One accepted non-blocking TCP connection.
    pub struct TcpConnection {
        id: ConnId,
        stream: TcpStream,
        connected: bool,
    }

    impl Connection for TcpConnection {
        fn id(&self) -> ConnId {
            self.id
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            if !self.connected {
                return Err(TransportError::Closed);
            }
            match self.stream.read(buf) {
                Ok(0) => {
                    self.connected = false;
                    Err(TransportError::Closed)
                }
                Ok(n) => Ok(n),
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::Interrupted =>
                {
                    Ok(0)
                }
                Err(e) => {
                    self.connected = false;
                    Err(TransportError::Io(e))
                }
            }
        }

        fn try_write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
            if !self.connected {
                return Err(TransportError::Closed);
            }
            match self.stream.write(buf) {
                Ok(n) => Ok(n),
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::Interrupted =>
                {
                    Ok(0)
                }
                Err(e) => {
                    self.connected = false;
                    Err(TransportError::Io(e))
                }
            }
        }

        fn close(&mut self) {
            if self.connected {
                if let Err(e) = self.stream.shutdown(std::net::Shutdown::Both) {
                    // NotConnected here just means the peer beat us to it.
                    if e.kind() != std::io::ErrorKind::NotConnected {
                        warn!(conn = %self.id, error = %e, "shutdown failed");
                    }
                }
                self.connected = false;
            }
        }
    }
}

// =============================================================================
// In-memory implementation (tests)
// =============================================================================

/// In-memory transport for tests.
///
/// A [`mem::MemListener`] hands out connections scripted through
/// [`mem::MemPeer`] handles: the test writes request bytes, lets the server
/// advance, and inspects what came back. Not thread-safe; the firmware loop
/// is single-threaded by construction and so are the tests.
pub mod mem {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::{ConnId, Connection, Listener};
    use crate::error::TransportError;

    #[derive(Debug)]
    struct Shared {
        to_server: VecDeque<u8>,
        to_client: Vec<u8>,
        client_open: bool,
        server_open: bool,
        /// Max bytes accepted per `try_write` call; `None` = unlimited.
        write_chunk: Option<usize>,
    }

    impl Shared {
        fn new() -> Self {
            Self {
                to_server: VecDeque::new(),
                to_client: Vec::new(),
                client_open: true,
                server_open: true,
                write_chunk: None,
            }
        }
    }

    /// Test-side handle to one in-memory connection.
    #[derive(Debug, Clone)]
    pub struct MemPeer {
        shared: Rc<RefCell<Shared>>,
    }

    impl MemPeer {
        /// Queues request bytes for the server to read.
        pub fn send(&self, bytes: &[u8]) {
            self.shared.borrow_mut().to_server.extend(bytes);
        }

        /// Takes everything the server has written so far.
        pub fn take_received(&self) -> Vec<u8> {
            std::mem::take(&mut self.shared.borrow_mut().to_client)
        }

        /// Simulates the client dropping the connection.
        pub fn disconnect(&self) {
            self.shared.borrow_mut().client_open = false;
        }

        /// Returns `true` while the server side has not closed.
        pub fn server_open(&self) -> bool {
            self.shared.borrow().server_open
        }

        /// Limits how many bytes each server write moves, to exercise
        /// multi-tick response flushing.
        pub fn set_write_chunk(&self, limit: usize) {
            self.shared.borrow_mut().write_chunk = Some(limit);
        }
    }

    /// Server side of one in-memory connection.
    #[derive(Debug)]
    pub struct MemConnection {
        id: ConnId,
        shared: Rc<RefCell<Shared>>,
    }

    impl Connection for MemConnection {
        fn id(&self) -> ConnId {
            self.id
        }

        fn is_connected(&self) -> bool {
            let s = self.shared.borrow();
            s.server_open && (s.client_open || !s.to_server.is_empty())
        }

        fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            let mut s = self.shared.borrow_mut();
            if !s.server_open {
                return Err(TransportError::Closed);
            }
            if s.to_server.is_empty() {
                return if s.client_open {
                    Ok(0)
                } else {
                    Err(TransportError::Closed)
                };
            }
            let n = buf.len().min(s.to_server.len());
            for slot in buf.iter_mut().take(n) {
                *slot = s.to_server.pop_front().unwrap();
            }
            Ok(n)
        }

        fn try_write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
            let mut s = self.shared.borrow_mut();
            if !s.server_open {
                return Err(TransportError::Closed);
            }
            if !s.client_open {
                return Err(TransportError::Closed);
            }
            let n = match s.write_chunk {
                Some(limit) => buf.len().min(limit),
                None => buf.len(),
            };
            s.to_client.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn close(&mut self) {
            self.shared.borrow_mut().server_open = false;
        }
    }

    /// An in-memory listener fed by [`MemListener::connect`].
    #[derive(Debug, Default)]
    pub struct MemListener {
        pending: VecDeque<MemConnection>,
        next_id: u64,
    }

    impl MemListener {
        /// Creates an empty listener.
        pub fn new() -> Self {
            Self::default()
        }

        /// Queues a new client connection and returns its peer handle.
        pub fn connect(&mut self) -> MemPeer {
            let shared = Rc::new(RefCell::new(Shared::new()));
            let id = ConnId(self.next_id);
            self.next_id += 1;
            self.pending.push_back(MemConnection {
                id,
                shared: Rc::clone(&shared),
            });
            MemPeer { shared }
        }

        /// Number of connections waiting to be accepted.
        pub fn backlog(&self) -> usize {
            self.pending.len()
        }
    }

    impl Listener for MemListener {
        type Conn = MemConnection;

        fn poll_accept(&mut self) -> Result<Option<MemConnection>, TransportError> {
            Ok(self.pending.pop_front())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Moving decoded commands between a transfer and its peer.
//!
//! A [`Transport`] is owned by exactly one transfer. It is opened when the
//! transfer is created and hands everything it receives to the transfer
//! through [`TransportEvents`], which serializes delivery with the
//! transfer's timer and caller operations.

use std::io::{self, ErrorKind};
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::bytes::{FromBytes, IntoBytes};
use crate::error::TransferError;
use crate::packet::{Command, RECV_BUFFER_SIZE};
use crate::transfer::{lock, Event, Session};

/// The lowest port handed out for transfer IDs.
pub const MIN_PORT_NUMBER: u16 = 1001;

/// How many random ports are tried before giving up.
const BIND_ATTEMPTS: usize = 16;

/// How often the receive loop checks whether it was closed.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sends and receives commands for a single transfer.
pub trait Transport: Send {
    /// Starts delivering received commands to `events`.
    fn open(&mut self, events: TransportEvents) -> io::Result<()>;

    /// Sends `command` to `to`.
    fn send(&mut self, command: &Command, to: SocketAddr) -> io::Result<()>;

    /// Stops delivering events. Must be idempotent.
    fn close(&mut self);
}

/// Where a [`Transport`] delivers what it receives.
#[derive(Clone)]
pub struct TransportEvents {
    session: Weak<Mutex<Session>>,
}

impl TransportEvents {
    pub(crate) fn new(session: Weak<Mutex<Session>>) -> Self {
        Self { session }
    }

    /// Hands a received command to the transfer.
    ///
    /// Returns `false` once the transfer is gone and nothing more should be
    /// delivered.
    pub fn command_received(&self, command: Command, from: SocketAddr) -> bool {
        self.deliver(Event::Command(command, from))
    }

    /// Reports a failure below the protocol layer. This ends the transfer.
    pub fn error(&self, error: TransferError) -> bool {
        self.deliver(Event::TransportError(error))
    }

    /// Reports a datagram from `from` that is not a TFTP packet.
    ///
    /// Ends the transfer only when `from` is the transfer's peer.
    pub fn undecodable(&self, from: SocketAddr) -> bool {
        self.deliver(Event::Undecodable(from))
    }

    fn deliver(&self, event: Event) -> bool {
        match self.session.upgrade() {
            Some(session) => {
                lock(&session).handle(event);
                true
            }
            None => false,
        }
    }
}

/// Binds a UDP socket to a random port on `ip`.
///
/// RFC 1350 asks for transfer IDs to be chosen randomly.
pub fn bind_random(ip: IpAddr) -> io::Result<UdpSocket> {
    let mut rng = rand::thread_rng();
    let mut last_error = io::Error::from(ErrorKind::AddrInUse);

    for _ in 0..BIND_ATTEMPTS {
        let port: u16 = rng.gen_range(MIN_PORT_NUMBER, u16::MAX);
        match UdpSocket::bind((ip, port)) {
            Ok(socket) => return Ok(socket),
            Err(err) if err.kind() == ErrorKind::AddrInUse => last_error = err,
            Err(err) => return Err(err),
        }
    }

    Err(last_error)
}

/// A [`Transport`] over a UDP socket, received on a background thread.
pub struct UdpTransport {
    socket: UdpSocket,
    closed: Arc<AtomicBool>,
}

impl UdpTransport {
    /// Wraps an already bound socket.
    pub fn new(socket: UdpSocket) -> Self {
        Self {
            socket,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Binds a socket to a random port on `ip`.
    pub fn bind_random(ip: IpAddr) -> io::Result<Self> {
        bind_random(ip).map(Self::new)
    }

    /// The address this transport receives on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn open(&mut self, events: TransportEvents) -> io::Result<()> {
        let socket = self.socket.try_clone()?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let closed = Arc::clone(&self.closed);

        // Not joined on close: the thread may be waiting on the transfer
        // lock held by whoever is closing us.
        thread::Builder::new()
            .name("tftp-recv".to_string())
            .spawn(move || receive_loop(socket, closed, events))?;

        Ok(())
    }

    fn send(&mut self, command: &Command, to: SocketAddr) -> io::Result<()> {
        let bytes = command.clone().into_bytes();
        self.socket.send_to(&bytes[..], to)?;
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn receive_loop(socket: UdpSocket, closed: Arc<AtomicBool>, events: TransportEvents) {
    let mut buf = vec![0; RECV_BUFFER_SIZE];

    while !closed.load(Ordering::Acquire) {
        let (nbytes, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                continue
            }
            Err(err) => {
                if !closed.load(Ordering::Acquire) {
                    events.error(TransferError::Transport(Arc::new(err)));
                }
                break;
            }
        };

        let delivered = match Command::from_bytes(&buf[..nbytes]) {
            Ok(command) => events.command_received(command, from),
            Err(_) => {
                warn!(%from, nbytes, "received an undecodable datagram");
                events.undecodable(from)
            }
        };

        if !delivered {
            break;
        }
    }

    debug!(local = ?socket.local_addr().ok(), "receive loop stopped");
}

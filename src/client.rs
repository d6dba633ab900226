//! A client-side connection to a TFTP server. Implementors can use this
//! to build a more fully-featured client application.

use std::io::{self, Read, Result, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};

use crate::error::Error;
use crate::packet::Mode;
use crate::stream::TransferStream;
use crate::transfer::{Role, Transfer};
use crate::transport::UdpTransport;
use crate::TransferSettings;

/// The initial state for building a `Client`.
pub struct New(());

/// An intermediate state for building a `Client`.
///
/// At this point, the `Builder` has all the information
/// it needs to construct a client.
pub struct ConnectTo {
    server: SocketAddr,
}

/// Builds a `Client`.
pub struct Builder<T> {
    data: T,
    settings: TransferSettings,
    bind_ip: Option<IpAddr>,
}

/// Talks to a single TFTP server. Every transfer gets its own socket and
/// therefore its own transfer ID.
#[derive(Clone, Debug)]
pub struct Client {
    server: SocketAddr,
    settings: TransferSettings,
    bind_ip: IpAddr,
}

impl Builder<New> {
    /// Starts building a client with default settings.
    pub fn new() -> Self {
        Builder {
            data: New(()),
            settings: TransferSettings::default(),
            bind_ip: None,
        }
    }

    /// Stores the address of the server to connect to.
    pub fn connect_to<A: ToSocketAddrs>(self, server: A) -> Result<Builder<ConnectTo>> {
        let server = server.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "server address did not resolve")
        })?;

        Ok(Builder {
            data: ConnectTo { server },
            settings: self.settings,
            bind_ip: self.bind_ip,
        })
    }
}

impl Default for Builder<New> {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder<ConnectTo> {
    /// Constructs the client.
    pub fn build(self) -> Client {
        let server = self.data.server;
        let bind_ip = self.bind_ip.unwrap_or(match server {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        });

        Client {
            server,
            settings: self.settings,
            bind_ip,
        }
    }
}

impl<T> Builder<T> {
    /// Sets the settings of the future client's transfers.
    pub fn with_settings(mut self, settings: TransferSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Binds transfer sockets to `ip` instead of the unspecified address.
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = Some(ip);
        self
    }
}

impl Client {
    /// Prepares a transfer that reads `file` from the server.
    ///
    /// Nothing is sent until the transfer is started.
    pub fn read<S: AsRef<str>>(&self, file: S, mode: Mode) -> Result<Transfer> {
        self.transfer(Role::ClientRead, file.as_ref(), mode)
    }

    /// Prepares a transfer that stores `file` on the server.
    ///
    /// Nothing is sent until the transfer is started.
    pub fn write<S: AsRef<str>>(&self, file: S, mode: Mode) -> Result<Transfer> {
        self.transfer(Role::ClientWrite, file.as_ref(), mode)
    }

    /// Retrieves a file from the remote server, blocking until done.
    pub fn get<S: AsRef<str>, W: Write + Send + 'static>(
        &self,
        file: S,
        mode: Mode,
        writer: W,
    ) -> std::result::Result<(), Error> {
        self.read(file, mode)?.run(TransferStream::sink(writer))
    }

    /// Stores a file on the remote server, blocking until done.
    pub fn put<S: AsRef<str>, R: Read + Send + 'static>(
        &self,
        file: S,
        mode: Mode,
        reader: R,
    ) -> std::result::Result<(), Error> {
        self.write(file, mode)?.run(TransferStream::source(reader))
    }

    fn transfer(&self, role: Role, file: &str, mode: Mode) -> Result<Transfer> {
        let transport = UdpTransport::bind_random(self.bind_ip)?;
        Transfer::outgoing(role, file, mode, transport, self.server, &self.settings)
    }
}

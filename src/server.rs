use std::io::{self, Result};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};

use tracing::{debug, warn};

use crate::bytes::{FromBytes, IntoBytes};
use crate::packet::{Command, ErrorCode, Mode, RECV_BUFFER_SIZE};
use crate::transfer::{Role, Transfer};
use crate::transport::{self, UdpTransport};
use crate::TransferSettings;

/// Listens for read and write requests.
///
/// Each accepted request becomes a [`Transfer`] on a new socket; the caller
/// decides whether to start it (with a stream for the file) or to refuse it
/// with [`Transfer::cancel`].
pub struct Server {
    socket: UdpSocket,
    settings: TransferSettings,
}

impl Server {
    /// Listens on `bind_to`.
    pub fn bind<A: ToSocketAddrs>(bind_to: A) -> Result<Self> {
        let socket = UdpSocket::bind(bind_to)?;

        Ok(Self {
            socket,
            settings: TransferSettings::default(),
        })
    }

    /// Listens on a random port of `ip`, returning the port alongside.
    pub fn random_port(ip: IpAddr) -> Result<(u16, Self)> {
        let socket = transport::bind_random(ip)?;
        let port = socket.local_addr()?.port();

        Ok((
            port,
            Self {
                socket,
                settings: TransferSettings::default(),
            },
        ))
    }

    /// Sets the settings of the transfers this server hands out.
    pub fn with_settings(mut self, settings: TransferSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The address requests are received on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Blocks until a request arrives and returns the transfer answering it.
    ///
    /// Anything other than a read or write request is answered with an
    /// error packet and reported as `InvalidInput`.
    pub fn serve(&self) -> Result<Transfer> {
        let mut buf = vec![0; RECV_BUFFER_SIZE];
        let (nbytes, client) = self.socket.recv_from(&mut buf)?;

        let (role, request) = match Command::from_bytes(&buf[..nbytes]) {
            Ok(Command::ReadRequest(rq)) => (Role::ServerRead, rq),
            Ok(Command::WriteRequest(rq)) => (Role::ServerWrite, rq),
            Ok(other) => {
                warn!(%client, command = %other, "expected a request");
                return Err(self.refuse(client, ErrorCode::IllegalOperation.as_str()));
            }
            Err(err) => {
                warn!(%client, nbytes, "undecodable request");
                self.reply_error(client, ErrorCode::IllegalOperation.as_str());
                return Err(err);
            }
        };

        if request.mode == Mode::Mail {
            return Err(self.refuse(client, "mail mode is not supported"));
        }

        debug!(%client, ?role, file = %request.filename, "accepted request");

        let transport = UdpTransport::bind_random(self.socket.local_addr()?.ip())?;
        Transfer::incoming(role, request, transport, client, &self.settings)
    }

    fn refuse(&self, client: SocketAddr, message: &str) -> io::Error {
        self.reply_error(client, message);
        io::Error::new(io::ErrorKind::InvalidInput, message.to_string())
    }

    fn reply_error(&self, client: SocketAddr, message: &str) {
        let bytes = Command::error(ErrorCode::IllegalOperation, message).into_bytes();
        let _ = self.socket.send_to(&bytes[..], client);
    }
}

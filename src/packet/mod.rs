//! Types that represent TFTP packets and their wire encoding.
//!
//! Every packet starts with a two byte big-endian [`Opcode`], followed by
//! opcode-specific fields. Requests and option acknowledgements may carry
//! trailing `name\0value\0` option pairs (RFC 2347).

use std::fmt;
use std::io::{self, ErrorKind, Result};
use std::mem::size_of;

use crate::bytes::{Bytes, FromBytes, IntoBytes};

mod ack;
mod data;
mod error;
mod mode;
mod oack;
mod opcode;
mod rq;

pub use ack::Ack;
pub use data::Data;
pub use error::{ErrorCode, ErrorPacket};
pub use mode::Mode;
pub use oack::OptionAck;
pub use opcode::Opcode;
pub use rq::Request;

/// Size of the buffer datagrams are received into.
pub const RECV_BUFFER_SIZE: usize = 65536;

/// A 16-bit block number.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Block(u16);

impl Block {
    /// Creates a new `Block`.
    pub const fn new(n: u16) -> Self {
        Self(n)
    }

    /// The raw block number.
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromBytes for Block {
    type Error = io::Error;

    fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self> {
        let bytes = Bytes::<u16>::from_bytes(bytes)?;
        Ok(Self(bytes.into_inner()))
    }
}

impl IntoBytes for Block {
    fn into_bytes(self) -> Vec<u8> {
        Bytes::new(self.0).into_bytes()
    }
}

/// A decoded TFTP packet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// The peer wants to receive a file.
    ReadRequest(Request),

    /// The peer wants to send a file.
    WriteRequest(Request),

    /// A block of file contents.
    Data(Data),

    /// Acknowledges a block (or a write request, as block 0).
    Ack(Ack),

    /// The peer gave up on the transfer.
    Error(ErrorPacket),

    /// The peer accepted (some of) the proposed options.
    OptionAck(OptionAck),
}

impl Command {
    /// Creates an `Ack` command.
    pub fn ack(block: Block) -> Self {
        Command::Ack(Ack { block })
    }

    /// Creates a `Data` command.
    pub fn data<T: AsRef<[u8]>>(block: Block, data: T) -> Self {
        Command::Data(Data::new(block, data))
    }

    /// Creates an `Error` command.
    pub fn error<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Command::Error(ErrorPacket::new(code, message))
    }

    /// The opcode this command is encoded with.
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::ReadRequest(_) => Opcode::Rrq,
            Command::WriteRequest(_) => Opcode::Wrq,
            Command::Data(_) => Opcode::Data,
            Command::Ack(_) => Opcode::Ack,
            Command::Error(_) => Opcode::Error,
            Command::OptionAck(_) => Opcode::Oack,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::ReadRequest(rq) | Command::WriteRequest(rq) => {
                write!(f, "{} {} ({})", self.opcode(), rq.filename, rq.mode)
            }
            Command::Data(data) => write!(f, "DATA #{} [{}]", data.block, data.data.len()),
            Command::Ack(ack) => write!(f, "ACK #{}", ack.block),
            Command::Error(err) => write!(f, "ERROR {:?}: {}", err.code, err.message),
            Command::OptionAck(oack) => write!(f, "OACK {:?}", oack.options),
        }
    }
}

impl FromBytes for Command {
    type Error = io::Error;

    fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self> {
        let bytes = bytes.as_ref();

        let split_at = size_of::<u16>();
        if split_at > bytes.len() {
            return Err(ErrorKind::InvalidInput.into());
        }

        let (opcode, body) = bytes.split_at(split_at);

        Ok(match Opcode::from_bytes(opcode)? {
            Opcode::Rrq => Command::ReadRequest(Request::from_bytes(body)?),
            Opcode::Wrq => Command::WriteRequest(Request::from_bytes(body)?),
            Opcode::Data => Command::Data(Data::from_bytes(body)?),
            Opcode::Ack => Command::Ack(Ack::from_bytes(body)?),
            Opcode::Error => Command::Error(ErrorPacket::from_bytes(body)?),
            Opcode::Oack => Command::OptionAck(OptionAck::from_bytes(body)?),
        })
    }
}

impl IntoBytes for Command {
    fn into_bytes(self) -> Vec<u8> {
        let mut bytes = self.opcode().into_bytes();

        let mut body = match self {
            Command::ReadRequest(rq) | Command::WriteRequest(rq) => rq.into_bytes(),
            Command::Data(data) => data.into_bytes(),
            Command::Ack(ack) => ack.into_bytes(),
            Command::Error(err) => err.into_bytes(),
            Command::OptionAck(oack) => oack.into_bytes(),
        };

        bytes.append(&mut body);
        bytes
    }
}

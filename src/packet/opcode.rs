//! The two byte packet type at the front of every datagram.

use std::convert::TryFrom;
use std::fmt;
use std::io::{self, ErrorKind, Result};

use crate::bytes::{Bytes, FromBytes, IntoBytes};

/// An integer identifier for the type of TFTP packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum Opcode {
    /// Read request.
    Rrq = 1,

    /// Write request.
    Wrq = 2,

    /// Data.
    Data = 3,

    /// Acknowledges successful receipt of a `Data` packet.
    Ack = 4,

    /// A courtesy packet to indicate the peer has experienced an error
    /// and will not complete the transmission.
    Error = 5,

    /// Acknowledges the options proposed in a request (RFC 2347).
    Oack = 6,
}

const ALL: [Opcode; 6] = [
    Opcode::Rrq,
    Opcode::Wrq,
    Opcode::Data,
    Opcode::Ack,
    Opcode::Error,
    Opcode::Oack,
];

impl Opcode {
    /// The short name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Rrq => "RRQ",
            Opcode::Wrq => "WRQ",
            Opcode::Data => "DATA",
            Opcode::Ack => "ACK",
            Opcode::Error => "ERROR",
            Opcode::Oack => "OACK",
        }
    }
}

impl TryFrom<u16> for Opcode {
    type Error = io::Error;

    fn try_from(val: u16) -> Result<Self> {
        ALL.iter()
            .copied()
            .find(|op| *op as u16 == val)
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, format!("unknown opcode {}", val)))
    }
}

impl IntoBytes for Opcode {
    fn into_bytes(self) -> Vec<u8> {
        Bytes::new(self as u16).into_bytes()
    }
}

impl FromBytes for Opcode {
    type Error = io::Error;

    fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self> {
        Opcode::try_from(Bytes::<u16>::from_bytes(bytes)?.into_inner())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_opcode_decodes_to_itself() {
        for op in ALL.iter().copied() {
            assert_eq!(Opcode::from_bytes(op.into_bytes()).unwrap(), op);
        }
    }

    #[test]
    fn test_unknown_opcodes() {
        assert!(Opcode::try_from(0u16).is_err());
        assert!(Opcode::try_from(7u16).is_err());
        assert!(Opcode::from_bytes(&[0x00]).is_err());
        assert_eq!(Opcode::Oack.into_bytes(), vec![0x00, 0x06]);
    }
}

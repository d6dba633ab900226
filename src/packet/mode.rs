//! Describes the modes of operation for TFTP.
//!
//! `Mail` is deprecated and should not be implemented. It is still decoded
//! so that a request naming it can be refused with a proper error.

use std::fmt;
use std::io::{self, ErrorKind, Result};
use std::str::FromStr;

use crate::bytes::{Bytes, FromBytes, IntoBytes};

/// The modes of operation for TFTP.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Deprecated.
    Mail,

    /// 8-bit ASCII (text).
    NetAscii,

    /// 8-bit binary.
    Octet,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Mail => "mail",
            Mode::NetAscii => "netascii",
            Mode::Octet => "octet",
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Octet
    }
}

impl IntoBytes for Mode {
    fn into_bytes(self) -> Vec<u8> {
        Bytes::new(self.as_str().to_string()).into_bytes()
    }
}

impl FromBytes for Mode {
    type Error = io::Error;

    fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self> {
        let s: String = Bytes::from_bytes(bytes)?.into_inner();

        Mode::from_str(&s)
    }
}

impl FromStr for Mode {
    type Err = io::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.to_ascii_lowercase();

        Ok(match s.as_str() {
            "mail" => Mode::Mail,
            "netascii" => Mode::NetAscii,
            "octet" => Mode::Octet,
            _ => return Err(ErrorKind::InvalidInput.into()),
        })
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_conversions() {
        assert_eq!(Mode::from_str("mail").unwrap(), Mode::Mail);
        assert_eq!(Mode::from_str("netascii").unwrap(), Mode::NetAscii);
        assert_eq!(Mode::from_str("octet").unwrap(), Mode::Octet);
        assert_eq!(Mode::from_bytes(b"mail\0").unwrap(), Mode::Mail);
        assert_eq!(Mode::from_bytes(b"netascii\0").unwrap(), Mode::NetAscii);
        assert_eq!(Mode::from_bytes(b"octet\0").unwrap(), Mode::Octet);
        assert_eq!(Mode::from_str("NeTasCiI").unwrap(), Mode::NetAscii);
        assert!(Mode::from_str("potato").is_err());
        assert_eq!(Mode::Octet.into_bytes(), b"octet\0".to_vec());
    }
}

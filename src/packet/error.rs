use std::io::{self, ErrorKind, Result};
use std::mem::size_of;

use crate::bytes::{Bytes, FirstNul, FromBytes, IntoBytes};

/// `ErrorCode` represents the error conditions that can be reached during
/// a regular TFTP operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    /// Not defined, see error message (if any).
    NotDefined = 0,

    /// File not found.
    FileNotFound = 1,

    /// Access violation.
    AccessViolation = 2,

    /// Disk full or allocation exceeded.
    DiskFull = 3,

    /// Illegal TFTP operation.
    IllegalOperation = 4,

    /// Unknown transfer ID.
    UnknownTid = 5,

    /// File already exists.
    FileAlreadyExists = 6,

    /// No such user.
    NoSuchUser = 7,

    /// The transfer should be terminated due to option negotiation (RFC 2347).
    OptionNegotiation = 8,
}

impl ErrorCode {
    /// Produces an `ErrorCode` from its wire value. Codes this crate does
    /// not know about are reported as `NotDefined`.
    pub fn from_u16(val: u16) -> Self {
        match val {
            1 => ErrorCode::FileNotFound,
            2 => ErrorCode::AccessViolation,
            3 => ErrorCode::DiskFull,
            4 => ErrorCode::IllegalOperation,
            5 => ErrorCode::UnknownTid,
            6 => ErrorCode::FileAlreadyExists,
            7 => ErrorCode::NoSuchUser,
            8 => ErrorCode::OptionNegotiation,
            _ => ErrorCode::NotDefined,
        }
    }

    /// A human readable description of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotDefined => "Not defined",
            ErrorCode::FileNotFound => "File not found",
            ErrorCode::AccessViolation => "Access violation",
            ErrorCode::DiskFull => "Disk full or allocation exceeded",
            ErrorCode::IllegalOperation => "Illegal TFTP operation",
            ErrorCode::UnknownTid => "Unknown transfer ID",
            ErrorCode::FileAlreadyExists => "File already exists",
            ErrorCode::NoSuchUser => "No such user",
            ErrorCode::OptionNegotiation => "Option negotiation failed",
        }
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => ErrorCode::FileNotFound,
            ErrorKind::PermissionDenied => ErrorCode::AccessViolation,
            ErrorKind::AlreadyExists => ErrorCode::FileAlreadyExists,
            ErrorKind::WriteZero | ErrorKind::OutOfMemory => ErrorCode::DiskFull,
            _ => ErrorCode::NotDefined,
        }
    }
}

/// An `ErrorPacket` is a courtesy packet that is sent prior to terminating
/// the TFTP connection due to an unrecoverable error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorPacket {
    /// An integer code that describes the error.
    pub code: ErrorCode,

    /// A human readable description of the error.
    pub message: String,
}

impl ErrorPacket {
    /// Creates a new `ErrorPacket`.
    pub fn new<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&io::Error> for ErrorPacket {
    fn from(err: &io::Error) -> Self {
        Self::new(err.kind().into(), err.to_string())
    }
}

impl FromBytes for ErrorPacket {
    type Error = io::Error;

    fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self> {
        let bytes = bytes.as_ref();

        let split_at = size_of::<u16>();
        if split_at > bytes.len() {
            return Err(ErrorKind::InvalidInput.into());
        }

        let (code, message) = bytes.split_at(split_at);
        let code = ErrorCode::from_u16(Bytes::<u16>::from_bytes(code)?.into_inner());

        // Some peers forget the terminator on the message.
        let message = match message.first_nul_idx() {
            Some(nul) => &message[..nul],
            None => message,
        };
        let message = String::from_utf8_lossy(message).into_owned();

        Ok(Self { code, message })
    }
}

impl IntoBytes for ErrorPacket {
    fn into_bytes(self) -> Vec<u8> {
        let mut bytes = Bytes::new(self.code as u16).into_bytes();
        bytes.append(&mut Bytes::new(self.message).into_bytes());
        bytes
    }
}

//! Read and write requests share a single layout:
//! `filename\0mode\0[name\0value\0]*`.

use std::io::{self, ErrorKind, Result};
use std::str::FromStr;

use super::mode::Mode;
use super::oack::{options_into_bytes, pair_up};
use crate::bytes::{split_strings, Bytes, FromBytes, IntoBytes};
use crate::options::TransferOption;

/// The body of a read or write request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Request {
    /// The file to read or write.
    pub filename: String,

    /// How the file contents are to be interpreted.
    pub mode: Mode,

    /// Options proposed by the requester.
    pub options: Vec<TransferOption>,
}

impl Request {
    /// Creates a new `Request`.
    pub fn new<T: AsRef<str>>(filename: T, mode: Mode, options: Vec<TransferOption>) -> Self {
        Self {
            filename: filename.as_ref().to_string(),
            mode,
            options,
        }
    }
}

impl FromBytes for Request {
    type Error = io::Error;

    fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self> {
        let mut strings = split_strings(bytes.as_ref())?.into_iter();

        let filename = strings
            .next()
            .ok_or_else(|| io::Error::from(ErrorKind::InvalidInput))?;
        let mode = strings
            .next()
            .ok_or_else(|| io::Error::from(ErrorKind::InvalidInput))?;
        let mode = Mode::from_str(&mode)?;
        let options = pair_up(strings.collect())?;

        Ok(Self {
            filename,
            mode,
            options,
        })
    }
}

impl IntoBytes for Request {
    fn into_bytes(self) -> Vec<u8> {
        let mut bytes = Bytes::new(self.filename).into_bytes();
        bytes.append(&mut self.mode.into_bytes());
        bytes.append(&mut options_into_bytes(self.options));
        bytes
    }
}

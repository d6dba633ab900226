use std::io::{self, ErrorKind, Result};

use crate::bytes::{split_strings, Bytes, FromBytes, IntoBytes};
use crate::options::TransferOption;

/// Acknowledges the options a peer is willing to use.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OptionAck {
    /// The acknowledged options in the order the peer sent them.
    pub options: Vec<TransferOption>,
}

impl OptionAck {
    /// Creates a new `OptionAck`.
    pub fn new(options: Vec<TransferOption>) -> Self {
        Self { options }
    }
}

impl FromBytes for OptionAck {
    type Error = io::Error;

    fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self> {
        let strings = split_strings(bytes.as_ref())?;
        let options = pair_up(strings)?;

        Ok(Self { options })
    }
}

impl IntoBytes for OptionAck {
    fn into_bytes(self) -> Vec<u8> {
        options_into_bytes(self.options)
    }
}

/// Turns a flat `[name, value, name, value, ..]` list into options.
pub(super) fn pair_up(strings: Vec<String>) -> Result<Vec<TransferOption>> {
    if strings.len() % 2 != 0 {
        return Err(ErrorKind::InvalidInput.into());
    }

    let mut options = Vec::with_capacity(strings.len() / 2);
    let mut strings = strings.into_iter();
    while let (Some(name), Some(value)) = (strings.next(), strings.next()) {
        options.push(TransferOption { name, value });
    }

    Ok(options)
}

pub(super) fn options_into_bytes(options: Vec<TransferOption>) -> Vec<u8> {
    let mut bytes = vec![];
    for option in options {
        bytes.append(&mut Bytes::new(option.name).into_bytes());
        bytes.append(&mut Bytes::new(option.value).into_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oack_bytes() {
        let oack = OptionAck::from_bytes(b"blksize\01024\0timeout\03\0").unwrap();
        assert_eq!(
            oack.options,
            vec![
                TransferOption::new("blksize", "1024"),
                TransferOption::new("timeout", "3"),
            ]
        );
        assert_eq!(oack.into_bytes(), b"blksize\01024\0timeout\03\0".to_vec());

        assert!(OptionAck::from_bytes(b"").unwrap().options.is_empty());
        assert!(OptionAck::from_bytes(b"blksize\0").is_err());
    }
}

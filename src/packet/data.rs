use std::io::{self, ErrorKind, Result};

use super::Block;
use crate::bytes::{FromBytes, IntoBytes};
use crate::options::MAX_BLOCK_SIZE;

/// A numbered block of file contents.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Data {
    /// The block number.
    pub block: Block,

    /// The payload, at most one negotiated block size long.
    pub data: Vec<u8>,
}

impl Data {
    /// Creates a new `Data` packet body.
    pub fn new<T: AsRef<[u8]>>(block: Block, data: T) -> Self {
        Self {
            block,
            data: data.as_ref().to_vec(),
        }
    }
}

impl FromBytes for Data {
    type Error = io::Error;

    fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self> {
        let bytes = bytes.as_ref();
        if bytes.len() < 2 {
            return Err(ErrorKind::InvalidInput.into());
        }

        let payload = &bytes[2..];
        if payload.len() > MAX_BLOCK_SIZE as usize {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "payload exceeds the largest block size",
            ));
        }

        Ok(Self::new(Block::from_bytes(&bytes[..2])?, payload))
    }
}

impl IntoBytes for Data {
    fn into_bytes(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + self.data.len());
        bytes.extend(self.block.into_bytes());
        bytes.extend(self.data);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes() {
        let actual = Data::from_bytes(b"\x01\x00quokka").unwrap();
        assert_eq!(actual.block, Block(256));
        assert_eq!(actual.data, b"quokka");

        // The terminating block of a file that fills its last block.
        let actual = Data::from_bytes(&[0xff, 0xff]).unwrap();
        assert_eq!(actual.block, Block(65535));
        assert!(actual.data.is_empty());

        assert!(Data::from_bytes(&[7]).is_err());
        assert!(Data::from_bytes(vec![0; 2 + MAX_BLOCK_SIZE as usize + 1]).is_err());
    }

    #[test]
    fn test_into_bytes() {
        let bytes = Data::new(Block(513), [9u8, 8]).into_bytes();
        assert_eq!(bytes, vec![0x02, 0x01, 9, 8]);
    }
}

use std::io::{self, ErrorKind, Result};
use std::mem::size_of;

use super::Block;
use crate::bytes::{FromBytes, IntoBytes};

/// Acknowledges a block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ack {
    /// The acknowledged block number.
    pub block: Block,
}

impl FromBytes for Ack {
    type Error = io::Error;

    fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self> {
        let bytes = bytes.as_ref();

        if bytes.len() != size_of::<Block>() {
            return Err(ErrorKind::InvalidInput.into());
        }

        let block = Block::from_bytes(bytes)?;

        Ok(Self { block })
    }
}

impl IntoBytes for Ack {
    fn into_bytes(self) -> Vec<u8> {
        self.block.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_bytes() {
        let ack = Ack::from_bytes(&[0, 12]).unwrap();
        assert_eq!(ack.block, Block::new(12));
        assert_eq!(ack.into_bytes(), vec![0, 12]);

        assert!(Ack::from_bytes(&[12]).is_err());
        assert!(Ack::from_bytes(&[0, 12, 0]).is_err());
    }
}

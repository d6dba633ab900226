use std::convert::AsRef;
use std::io::{self, ErrorKind};
use std::mem::size_of;

pub trait FromBytes: Sized {
    type Error;

    fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self, Self::Error>;
}

pub trait IntoBytes {
    fn into_bytes(self) -> Vec<u8>;
}

/// Locates the NUL terminators that delimit TFTP strings.
pub trait FirstNul {
    fn first_nul_idx(&self) -> Option<usize>;
}

impl FirstNul for [u8] {
    fn first_nul_idx(&self) -> Option<usize> {
        self.iter().position(|b| *b == 0)
    }
}

pub struct Bytes<T>(T);

impl<T> Bytes<T> {
    pub fn new(val: T) -> Self {
        Self(val)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl FromBytes for Bytes<u16> {
    type Error = io::Error;

    fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> io::Result<Self> {
        let bytes = bytes.as_ref();

        if bytes.len() != size_of::<u16>() {
            return Err(ErrorKind::InvalidInput.into());
        }

        let mut bs = [0u8; size_of::<u16>()];
        bs.copy_from_slice(bytes);

        Ok(Self(u16::from_be_bytes(bs)))
    }
}

impl IntoBytes for Bytes<u16> {
    fn into_bytes(self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }
}

/// A NUL-terminated string. The input must end with exactly one NUL byte.
impl FromBytes for Bytes<String> {
    type Error = io::Error;

    fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> io::Result<Self> {
        let bytes = bytes.as_ref();

        match bytes.first_nul_idx() {
            Some(idx) if idx + 1 == bytes.len() => {
                let s = std::str::from_utf8(&bytes[..idx])
                    .map_err(|_| io::Error::from(ErrorKind::InvalidInput))?;
                Ok(Self(s.to_string()))
            }
            _ => Err(ErrorKind::InvalidInput.into()),
        }
    }
}

impl IntoBytes for Bytes<String> {
    fn into_bytes(self) -> Vec<u8> {
        let mut bytes = self.0.into_bytes();
        bytes.push(0);
        bytes
    }
}

/// Splits `bytes` into consecutive NUL-terminated strings.
pub fn split_strings(bytes: &[u8]) -> io::Result<Vec<String>> {
    let mut strings = vec![];
    let mut rest = bytes;

    while !rest.is_empty() {
        let nul = rest
            .first_nul_idx()
            .ok_or_else(|| io::Error::from(ErrorKind::InvalidInput))?;
        let (head, tail) = rest.split_at(nul + 1);
        strings.push(Bytes::<String>::from_bytes(head)?.into_inner());
        rest = tail;
    }

    Ok(strings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u16_is_big_endian() {
        assert_eq!(Bytes::new(0x0102u16).into_bytes(), vec![0x01, 0x02]);
        assert_eq!(
            Bytes::<u16>::from_bytes(&[0x01, 0x02]).unwrap().into_inner(),
            0x0102
        );
        assert!(Bytes::<u16>::from_bytes(&[0x01]).is_err());
        assert!(Bytes::<u16>::from_bytes(&[0x01, 0x02, 0x03]).is_err());
    }

    #[test]
    fn test_string_requires_single_trailing_nul() {
        let s = Bytes::<String>::from_bytes(b"octet\0").unwrap();
        assert_eq!(s.into_inner(), "octet");

        assert!(Bytes::<String>::from_bytes(b"octet").is_err());
        assert!(Bytes::<String>::from_bytes(b"oc\0tet\0").is_err());
    }

    #[test]
    fn test_split_strings() {
        let strings = split_strings(b"blksize\01024\0tsize\00\0").unwrap();
        assert_eq!(strings, vec!["blksize", "1024", "tsize", "0"]);

        assert!(split_strings(b"").unwrap().is_empty());
        assert!(split_strings(b"dangling").is_err());
    }
}

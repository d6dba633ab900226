//! The stream a transfer reads blocks from or writes blocks to.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};

enum Inner {
    Source {
        reader: Box<dyn Read + Send>,
        len: Option<u64>,
    },
    Sink(Box<dyn Write + Send>),
}

/// The file contents being sent or received.
///
/// Sending transfers need a source, receiving transfers need a sink.
pub struct TransferStream(Inner);

impl TransferStream {
    /// A source whose length is not known in advance.
    pub fn source<R: Read + Send + 'static>(reader: R) -> Self {
        Self(Inner::Source {
            reader: Box::new(reader),
            len: None,
        })
    }

    /// A source that will yield exactly `len` bytes.
    pub fn source_with_len<R: Read + Send + 'static>(reader: R, len: u64) -> Self {
        Self(Inner::Source {
            reader: Box::new(reader),
            len: Some(len),
        })
    }

    /// A source backed by a file, sized from its metadata.
    pub fn file_source(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self::source_with_len(file, len))
    }

    /// A sink for received blocks.
    pub fn sink<W: Write + Send + 'static>(writer: W) -> Self {
        Self(Inner::Sink(Box::new(writer)))
    }

    /// Whether this stream can be read from.
    pub fn is_source(&self) -> bool {
        matches!(self.0, Inner::Source { .. })
    }

    /// The number of bytes a source will yield, if it reports one.
    pub fn known_len(&self) -> Option<u64> {
        match &self.0 {
            Inner::Source { len, .. } => *len,
            Inner::Sink(_) => None,
        }
    }

    /// Reads up to `size` bytes, stopping short only at the end of the stream.
    pub(crate) fn read_block(&mut self, size: usize) -> io::Result<Vec<u8>> {
        match &mut self.0 {
            Inner::Source { reader, .. } => {
                let mut block = Vec::with_capacity(size);
                reader.take(size as u64).read_to_end(&mut block)?;
                Ok(block)
            }
            Inner::Sink(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream is not readable",
            )),
        }
    }

    pub(crate) fn write_block(&mut self, block: &[u8]) -> io::Result<()> {
        match &mut self.0 {
            Inner::Sink(writer) => writer.write_all(block),
            Inner::Source { .. } => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream is not writable",
            )),
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        match &mut self.0 {
            Inner::Sink(writer) => writer.flush(),
            Inner::Source { .. } => Ok(()),
        }
    }
}

impl fmt::Debug for TransferStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Inner::Source { len, .. } => f.debug_struct("Source").field("len", len).finish(),
            Inner::Sink(_) => f.debug_struct("Sink").finish(),
        }
    }
}

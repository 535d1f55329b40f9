use std::io::{BufRead, ErrorKind};

use tracing::debug;

use crate::error::{Result, TransportError};

/// Byte that ends every chunk written by the device.
pub const CHUNK_TERMINATOR: u8 = b'\n';

/// Longest chunk prefix that can still hold a frame: header, length byte,
/// 255 payload bytes and the CRC. Bytes past it on the same line are dropped.
pub const MAX_CHUNK_LEN: usize = 2 + 255 + 2;

/// A source of newline-terminated byte chunks.
///
/// Chunks are split at [`CHUNK_TERMINATOR`] only, so a binary frame whose
/// payload happens to contain `0x0A` arrives in several chunks. Reassembly is
/// the caller's job.
pub trait ChunkSource {
    /// Append the next chunk (terminator included, when present) to `buf`.
    ///
    /// Returns the number of bytes appended. Fails with
    /// [`TransportError::EndOfStream`] once the source is exhausted.
    fn read_chunk(&mut self, buf: &mut Vec<u8>) -> Result<usize>;
}

impl<S: ChunkSource + ?Sized> ChunkSource for &mut S {
    fn read_chunk(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        (**self).read_chunk(buf)
    }
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn read_chunk(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        (**self).read_chunk(buf)
    }
}

/// Reads newline-delimited chunks from any `BufRead`.
///
/// The final chunk of a stream may lack the terminator; it is still returned,
/// and the following call reports end of stream. A line longer than the
/// chunk limit is cut at the limit and the rest of it, terminator included,
/// is skipped, so memory stays bounded on a link that never sends `\n`.
pub struct LineSource<R> {
    inner: R,
    max_chunk: usize,
}

impl<R: BufRead> LineSource<R> {
    /// Wrap a buffered reader, with chunks limited to [`MAX_CHUNK_LEN`].
    pub fn new(inner: R) -> Self {
        Self::with_max_chunk(inner, MAX_CHUNK_LEN)
    }

    /// Wrap a buffered reader with an explicit chunk limit (at least 1).
    pub fn with_max_chunk(inner: R, max_chunk: usize) -> Self {
        Self {
            inner,
            max_chunk: max_chunk.max(1),
        }
    }

    /// The longest chunk this source returns.
    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// Borrow the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the source and return the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: BufRead> ChunkSource for LineSource<R> {
    fn read_chunk(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        let mut kept = 0usize;
        let mut skipped = 0usize;

        loop {
            let available = match self.inner.fill_buf() {
                Ok(available) => available,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            };
            if available.is_empty() {
                break;
            }

            let (used, done) = match available.iter().position(|&b| b == CHUNK_TERMINATOR) {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            };
            let take = used.min(self.max_chunk - kept);
            buf.extend_from_slice(&available[..take]);
            kept += take;
            skipped += used - take;
            self.inner.consume(used);

            if done {
                break;
            }
        }

        if kept == 0 {
            return Err(TransportError::EndOfStream);
        }
        if skipped > 0 {
            debug!(kept, skipped, "chunk exceeded limit, dropped its tail");
        }
        Ok(kept)
    }
}

impl<R> std::fmt::Debug for LineSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSource")
            .field("max_chunk", &self.max_chunk)
            .finish_non_exhaustive()
    }
}

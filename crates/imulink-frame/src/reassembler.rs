//! Reassembly of newline-chunked reads into candidate frames.
//!
//! The device terminates each frame with `\n`, but the payload is binary and
//! may itself contain `0x0A`. Such a frame reaches us as several chunks; the
//! reassembler keeps the incomplete head in a pending buffer until the length
//! byte is satisfied.

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::codec::{frame_len, HEADER, MAX_FRAME_SIZE, MIN_CHUNK_SIZE};

/// Outcome of feeding one chunk to a [`Reassembler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    /// A length-complete candidate frame (`':' L payload crc`), CRC unchecked.
    Frame(Bytes),
    /// Too short to hold any frame; dropped as noise.
    Short { len: usize },
    /// Does not start with `':'`; dropped.
    BadHeader { byte: u8 },
    /// Buffered; more chunks are needed.
    Fragmented { have: usize, need: usize },
}

impl Assembly {
    /// The candidate frame, if this chunk completed one.
    pub fn into_frame(self) -> Option<Bytes> {
        match self {
            Assembly::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Per-stream reassembly state.
///
/// Holds at most one frame's worth of undelivered bytes. Never share one
/// instance between streams.
#[derive(Debug)]
pub struct Reassembler {
    pending: BytesMut,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            pending: BytesMut::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// Feed one chunk, as read from the source.
    pub fn push(&mut self, chunk: &[u8]) -> Assembly {
        let mut buffer = std::mem::take(&mut self.pending);
        buffer.extend_from_slice(chunk);

        if buffer.len() < MIN_CHUNK_SIZE {
            trace!(len = buffer.len(), "dropping short chunk");
            return Assembly::Short { len: buffer.len() };
        }

        if buffer[0] != HEADER {
            debug!(byte = buffer[0], len = buffer.len(), "dropping chunk without frame header");
            return Assembly::BadHeader { byte: buffer[0] };
        }

        let need = frame_len(usize::from(buffer[1]));
        if buffer.len() < need {
            let have = buffer.len();
            trace!(have, need, "frame continues in next chunk");
            self.pending = buffer;
            return Assembly::Fragmented { have, need };
        }

        // Anything past the CRC (the `\n` terminator) is not part of the frame.
        buffer.truncate(need);
        Assembly::Frame(buffer.freeze())
    }

    /// Returns true if a fragmented frame is waiting for more bytes.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of buffered bytes of the in-progress frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop any in-progress frame.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

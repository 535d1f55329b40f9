use std::sync::mpsc;
use std::thread::JoinHandle;

use imulink_transport::ChunkSource;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::decoder::{decode_frame_with, DecoderConfig};
use crate::error::{FrameError, Result};
use crate::measurement::Decoded;
use crate::reassembler::{Assembly, Reassembler};
use crate::sink::MeasurementSink;

const INITIAL_CHUNK_CAPACITY: usize = 512;

/// Per-stream counters of every reassembly and decode outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Chunks read from the source.
    pub chunks: u64,
    /// Chunks dropped as too short to hold a frame.
    pub short_buffers: u64,
    /// Chunks dropped for not starting with `':'`.
    pub bad_headers: u64,
    /// Chunks buffered as part of an incomplete frame.
    pub fragments: u64,
    /// Length-complete candidate frames.
    pub frames: u64,
    pub measurements: u64,
    pub init_notices: u64,
    pub checksum_mismatches: u64,
    pub truncated_fields: u64,
    pub conflicting_quaternions: u64,
    /// Candidates that were not well-formed frames.
    pub malformed: u64,
}

impl DecodeStats {
    /// Frames dropped for failing an integrity check.
    pub fn discarded(&self) -> u64 {
        self.checksum_mismatches
            + self.truncated_fields
            + self.conflicting_quaternions
            + self.malformed
    }
}

/// Reassembly, decoding and bookkeeping for one stream, independent of how
/// chunks are obtained.
#[derive(Debug, Default)]
pub(crate) struct FramePipeline {
    reassembler: Reassembler,
    pub(crate) config: DecoderConfig,
    pub(crate) stats: DecodeStats,
}

impl FramePipeline {
    pub(crate) fn new(config: DecoderConfig) -> Self {
        Self {
            reassembler: Reassembler::new(),
            config,
            stats: DecodeStats::default(),
        }
    }

    /// Feed one chunk. Returns a value when the chunk completes a frame that
    /// should be delivered.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Result<Option<Decoded>> {
        self.stats.chunks += 1;

        let frame = match self.reassembler.push(chunk) {
            Assembly::Frame(frame) => frame,
            Assembly::Short { .. } => {
                self.stats.short_buffers += 1;
                return Ok(None);
            }
            Assembly::BadHeader { .. } => {
                self.stats.bad_headers += 1;
                return Ok(None);
            }
            Assembly::Fragmented { .. } => {
                self.stats.fragments += 1;
                return Ok(None);
            }
        };
        self.stats.frames += 1;

        match decode_frame_with(&frame, &self.config) {
            Ok(Decoded::Init(notice)) => {
                self.stats.init_notices += 1;
                info!(stage = ?notice.stage, code = notice.code, "{notice}");
                Ok(self
                    .config
                    .forward_init_notices
                    .then_some(Decoded::Init(notice)))
            }
            Ok(decoded) => {
                self.stats.measurements += 1;
                Ok(Some(decoded))
            }
            Err(err) if err.is_integrity() => {
                self.record_discard(&err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn record_discard(&mut self, err: &FrameError) {
        match err {
            FrameError::ChecksumMismatch { .. } => self.stats.checksum_mismatches += 1,
            FrameError::TruncatedField { .. } => self.stats.truncated_fields += 1,
            FrameError::ConflictingQuaternion { .. } => self.stats.conflicting_quaternions += 1,
            _ => self.stats.malformed += 1,
        }
        warn!(error = %err, "discarding frame");
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.reassembler.pending_len()
    }
}

/// Drives one byte source through reassembly and decoding.
///
/// Owns the stream's [`Reassembler`], so each connection needs its own
/// reader. Framing noise and integrity failures are logged and skipped;
/// only source errors and a closed sink end the loop.
pub struct TelemetryReader<S> {
    source: S,
    pipeline: FramePipeline,
    chunk: Vec<u8>,
}

impl<S: ChunkSource> TelemetryReader<S> {
    /// Create a reader with default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, DecoderConfig::default())
    }

    /// Create a reader with explicit configuration.
    pub fn with_config(source: S, config: DecoderConfig) -> Self {
        Self {
            source,
            pipeline: FramePipeline::new(config),
            chunk: Vec::with_capacity(INITIAL_CHUNK_CAPACITY),
        }
    }

    /// Read until the next value ready for delivery (blocking).
    ///
    /// Init notices are returned only when `forward_init_notices` is set.
    /// Returns `Err(FrameError::Transport(_))` when the source fails or ends.
    pub fn next_decoded(&mut self) -> Result<Decoded> {
        loop {
            self.chunk.clear();
            self.source.read_chunk(&mut self.chunk)?;
            if let Some(decoded) = self.pipeline.feed(&self.chunk)? {
                return Ok(decoded);
            }
        }
    }

    /// Deliver every decoded value to `sink` until the source ends or the
    /// sink closes. Always returns the error that stopped the loop.
    pub fn run<K: MeasurementSink>(&mut self, mut sink: K) -> FrameError {
        debug!("telemetry reader started");
        let err = loop {
            let decoded = match self.next_decoded() {
                Ok(decoded) => decoded,
                Err(err) => break err,
            };
            if let Err(err) = sink.deliver(decoded) {
                break err;
            }
        };

        let stats = self.pipeline.stats;
        if err.is_end_of_stream() {
            info!(?stats, "telemetry source closed");
        } else {
            warn!(error = %err, ?stats, "telemetry reader stopped");
        }
        err
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &DecodeStats {
        &self.pipeline.stats
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &DecoderConfig {
        &self.pipeline.config
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ChunkSource + Send + 'static> TelemetryReader<S> {
    /// Run the reader on its own thread, delivering into a bounded queue.
    ///
    /// The thread ends when the source ends or fails, or when the returned
    /// receiver is dropped. Joining yields the final counters and the error
    /// that stopped it.
    pub fn spawn(
        self,
        capacity: usize,
    ) -> std::io::Result<(mpsc::Receiver<Decoded>, JoinHandle<(DecodeStats, FrameError)>)> {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let handle = std::thread::Builder::new()
            .name("imulink-reader".to_string())
            .spawn(move || {
                let mut reader = self;
                let err = reader.run(tx);
                (reader.pipeline.stats, err)
            })?;
        Ok((rx, handle))
    }
}

impl<S> std::fmt::Debug for TelemetryReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryReader")
            .field("config", &self.pipeline.config)
            .field("stats", &self.pipeline.stats)
            .field("pending", &self.pipeline.pending_len())
            .finish_non_exhaustive()
    }
}

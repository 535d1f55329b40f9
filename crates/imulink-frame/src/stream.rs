//! Async decoding with `tokio_util::codec`.
//!
//! [`TelemetryCodec`] runs the same reassemble-then-decode pipeline as
//! [`TelemetryReader`](crate::TelemetryReader), so a serial port or capture
//! opened through tokio can be wrapped in a `FramedRead`.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::debug;

use crate::codec::MAX_FRAME_SIZE;
use crate::decoder::DecoderConfig;
use crate::error::FrameError;
use crate::measurement::Decoded;
use crate::reader::{DecodeStats, FramePipeline};

/// A `Decoder` yielding validated measurements (and, if configured, init
/// notices). Integrity failures are logged and skipped.
///
/// A line longer than [`MAX_FRAME_SIZE`] is cut at that size and the rest of
/// it, up to the next newline, is dropped, the same as
/// [`LineSource`](imulink_transport::LineSource) does.
#[derive(Debug, Default)]
pub struct TelemetryCodec {
    pipeline: FramePipeline,
    // Bytes of `src` already searched for a newline.
    scanned: usize,
    // Inside an overlong line whose head was already fed.
    discarding: bool,
}

impl TelemetryCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            pipeline: FramePipeline::new(config),
            scanned: 0,
            discarding: false,
        }
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &DecodeStats {
        &self.pipeline.stats
    }
}

impl Decoder for TelemetryCodec {
    type Item = Decoded;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.scanned..].iter().position(|&b| b == b'\n');
            let Some(offset) = newline else {
                if self.discarding {
                    src.clear();
                    self.scanned = 0;
                    return Ok(None);
                }
                if src.len() <= MAX_FRAME_SIZE {
                    self.scanned = src.len();
                    return Ok(None);
                }
                let head = src.split_to(MAX_FRAME_SIZE);
                debug!(dropped = src.len(), "chunk exceeded limit, dropping its tail");
                src.clear();
                self.scanned = 0;
                self.discarding = true;
                match self.pipeline.feed(&head)? {
                    Some(decoded) => return Ok(Some(decoded)),
                    None => continue,
                }
            };

            let chunk = src.split_to(self.scanned + offset + 1);
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            let kept = chunk.len().min(MAX_FRAME_SIZE);
            if kept < chunk.len() {
                debug!(dropped = chunk.len() - kept, "chunk exceeded limit, dropping its tail");
            }
            if let Some(decoded) = self.pipeline.feed(&chunk[..kept])? {
                return Ok(Some(decoded));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(decoded) = self.decode(src)? {
            return Ok(Some(decoded));
        }
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) || src.is_empty() {
            src.clear();
            return Ok(None);
        }
        // Unterminated tail: one last chunk, like a line reader at EOF.
        let tail = src.split();
        self.pipeline.feed(&tail)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio_util::codec::FramedRead;

    use super::*;
    use crate::codec::{encode_frame, encode_line};
    use crate::measurement::{InitNotice, InitStage};
    use crate::status::QUATERNION;

    fn quaternion_line(w: f32, dst: &mut BytesMut) {
        let mut payload = vec![QUATERNION];
        for v in [w, 0.0, 0.0, 0.0] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        encode_line(&payload, dst).unwrap();
    }

    #[tokio::test]
    async fn framed_read_yields_measurements() {
        let mut wire = BytesMut::new();
        quaternion_line(1.0, &mut wire);
        wire.extend_from_slice(b"ok\r\n");
        quaternion_line(2.0, &mut wire);

        let bytes = wire.to_vec();
        let mut framed = FramedRead::new(bytes.as_slice(), TelemetryCodec::new());

        let mut ws = Vec::new();
        while let Some(item) = framed.next().await {
            let decoded = item.unwrap();
            ws.push(decoded.as_measurement().unwrap().quaternion.unwrap().value().w);
        }
        assert_eq!(ws, vec![1.0, 2.0]);
        assert_eq!(framed.decoder().stats().short_buffers, 1);
    }

    #[tokio::test]
    async fn matches_blocking_reader() {
        let mut wire = BytesMut::new();
        let mut payload = vec![QUATERNION];
        for v in [1.0f32, 2.0, f32::from_bits(0x0A0A_0A0A), 3.0] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        encode_line(&payload, &mut wire).unwrap();
        wire.extend_from_slice(b"\r\n12-34-56\r\n");
        encode_line(&[0x02, 0x07], &mut wire).unwrap();
        quaternion_line(0.5, &mut wire);
        let bytes = wire.to_vec();

        let mut reader = crate::TelemetryReader::new(imulink_transport::LineSource::new(
            std::io::Cursor::new(bytes.clone()),
        ));
        let mut blocking = Vec::new();
        assert!(reader.run(&mut blocking).is_end_of_stream());

        let mut framed = FramedRead::new(bytes.as_slice(), TelemetryCodec::new());
        let mut streamed = Vec::new();
        while let Some(item) = framed.next().await {
            streamed.push(item.unwrap());
        }

        assert_eq!(streamed.len(), 2);
        assert_eq!(streamed, blocking);
        assert_eq!(framed.decoder().stats(), reader.stats());
    }

    #[test]
    fn partial_input_waits_for_more() {
        let mut wire = BytesMut::new();
        quaternion_line(3.0, &mut wire);
        let mut src = BytesMut::from(&wire[..10]);
        let mut codec = TelemetryCodec::new();

        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(&wire[10..]);
        let decoded = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(decoded.as_measurement().unwrap().quaternion.unwrap().value().w, 3.0);
        assert!(src.is_empty());
    }

    #[test]
    fn corrupted_frame_is_skipped() {
        let mut wire = BytesMut::new();
        quaternion_line(4.0, &mut wire);
        let crc_at = wire.len() - 3;
        wire[crc_at] ^= 0x80;
        quaternion_line(5.0, &mut wire);

        let mut codec = TelemetryCodec::new();
        let decoded = codec.decode(&mut wire).unwrap().unwrap();
        assert_eq!(decoded.as_measurement().unwrap().quaternion.unwrap().value().w, 5.0);
        assert_eq!(codec.stats().checksum_mismatches, 1);
    }

    #[test]
    fn init_notice_forwarding() {
        let mut wire = BytesMut::new();
        encode_line(&[0x01, 0x00], &mut wire).unwrap();

        let mut codec = TelemetryCodec::new();
        assert!(codec.decode(&mut wire.clone()).unwrap().is_none());

        let mut codec = TelemetryCodec::with_config(DecoderConfig {
            forward_init_notices: true,
            ..DecoderConfig::default()
        });
        assert_eq!(
            codec.decode(&mut wire).unwrap(),
            Some(Decoded::Init(InitNotice::new(InitStage::MpuConnection, 0)))
        );
    }

    #[test]
    fn unterminated_tail_decoded_at_eof() {
        let mut wire = BytesMut::new();
        encode_frame(&[0x02, 0x07], &mut wire).unwrap();
        wire.extend_from_slice(b"\0");

        let mut codec = TelemetryCodec::with_config(DecoderConfig {
            forward_init_notices: true,
            ..DecoderConfig::default()
        });
        assert!(codec.decode(&mut wire).unwrap().is_none());
        let decoded = codec.decode_eof(&mut wire).unwrap().unwrap();
        assert_eq!(decoded.as_init().unwrap().to_string(), "DMP init: 7");
        assert!(codec.decode_eof(&mut wire).unwrap().is_none());
    }

    #[test]
    fn newline_free_input_stays_bounded() {
        let mut codec = TelemetryCodec::new();
        let mut src = BytesMut::new();
        for _ in 0..64 {
            src.extend_from_slice(&[b':'; 16 * 1024]);
            assert!(codec.decode(&mut src).unwrap().is_none());
            assert!(src.len() <= MAX_FRAME_SIZE);
        }
        assert_eq!(codec.stats().chunks, 1);

        src.extend_from_slice(b"\n");
        quaternion_line(6.0, &mut src);
        let decoded = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(decoded.as_measurement().unwrap().quaternion.unwrap().value().w, 6.0);
        assert_eq!(codec.stats().chunks, 2);
        assert!(src.is_empty());
    }

    #[test]
    fn partial_scan_is_not_repeated() {
        let mut wire = BytesMut::new();
        quaternion_line(7.0, &mut wire);
        let mut codec = TelemetryCodec::new();
        let mut src = BytesMut::new();

        for &byte in &wire[..wire.len() - 1] {
            src.extend_from_slice(&[byte]);
            assert!(codec.decode(&mut src).unwrap().is_none());
            assert_eq!(codec.scanned, src.len());
        }
        src.extend_from_slice(&wire[wire.len() - 1..]);
        assert!(codec.decode(&mut src).unwrap().is_some());
        assert_eq!(codec.scanned, 0);
    }

    #[test]
    fn discarded_tail_is_dropped_at_eof() {
        let mut src = BytesMut::from(&[b'x'; MAX_FRAME_SIZE + 40][..]);
        let mut codec = TelemetryCodec::new();

        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(&[b'x'; 10]);
        assert!(codec.decode_eof(&mut src).unwrap().is_none());
        assert!(src.is_empty());
        assert_eq!(codec.stats().chunks, 1);
        assert_eq!(codec.stats().bad_headers, 1);
    }

    #[tokio::test]
    async fn overlong_line_matches_blocking_reader() {
        let mut wire = BytesMut::from(&[b':'; 2000][..]);
        wire.extend_from_slice(b"\n");
        quaternion_line(8.0, &mut wire);
        wire.extend_from_slice(&[b':'; MAX_FRAME_SIZE]);
        let bytes = wire.to_vec();

        let mut reader = crate::TelemetryReader::new(imulink_transport::LineSource::new(
            std::io::Cursor::new(bytes.clone()),
        ));
        let mut blocking = Vec::new();
        assert!(reader.run(&mut blocking).is_end_of_stream());

        let mut framed = FramedRead::new(bytes.as_slice(), TelemetryCodec::new());
        let mut streamed = Vec::new();
        while let Some(item) = framed.next().await {
            streamed.push(item.unwrap());
        }

        assert_eq!(streamed.len(), 1);
        assert_eq!(streamed, blocking);
        assert_eq!(framed.decoder().stats(), reader.stats());
    }

    #[test]
    fn frame_limit_matches_line_limit() {
        assert_eq!(imulink_transport::MAX_CHUNK_LEN, MAX_FRAME_SIZE);
    }
}

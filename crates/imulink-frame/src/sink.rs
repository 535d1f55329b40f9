//! Downstream delivery of decoded values.

use std::sync::mpsc;

use crate::error::{FrameError, Result};
use crate::measurement::Decoded;

/// Default bound for the queue between a reader thread and its consumer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Receives decoded values in stream order.
///
/// `deliver` may block; that is how a slow consumer slows down ingestion.
pub trait MeasurementSink {
    /// Hand one value downstream. Fails with [`FrameError::SinkClosed`] once
    /// the consumer is gone.
    fn deliver(&mut self, item: Decoded) -> Result<()>;
}

impl<S: MeasurementSink + ?Sized> MeasurementSink for &mut S {
    fn deliver(&mut self, item: Decoded) -> Result<()> {
        (**self).deliver(item)
    }
}

/// Bounded queue: blocks while the queue is full.
impl MeasurementSink for mpsc::SyncSender<Decoded> {
    fn deliver(&mut self, item: Decoded) -> Result<()> {
        self.send(item).map_err(|_| FrameError::SinkClosed)
    }
}

impl MeasurementSink for mpsc::Sender<Decoded> {
    fn deliver(&mut self, item: Decoded) -> Result<()> {
        self.send(item).map_err(|_| FrameError::SinkClosed)
    }
}

impl MeasurementSink for Vec<Decoded> {
    fn deliver(&mut self, item: Decoded) -> Result<()> {
        self.push(item);
        Ok(())
    }
}

/// Must be driven from a thread outside the tokio runtime.
#[cfg(feature = "async")]
impl MeasurementSink for tokio::sync::mpsc::Sender<Decoded> {
    fn deliver(&mut self, item: Decoded) -> Result<()> {
        self.blocking_send(item).map_err(|_| FrameError::SinkClosed)
    }
}

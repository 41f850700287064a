//! Bounded audio queue and output sinks.
//!
//! Decoded audio frames flow from the engine's callback thread into a
//! bounded crossbeam channel; a dedicated writer thread drains them to an
//! [`AudioSink`]. `push` blocks when the queue is full — this is the only
//! intentional backpressure point in the receiver, and it deliberately
//! stalls the callback thread when the consumer is slow. A distinguished
//! end-of-stream marker lets the consumer drain the remaining frames and
//! terminate; the producer must not push after requesting it.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use crate::error::{Error, Result};

/// Decoded audio output framing: 16-bit signed, stereo, fixed rate.
pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS: u16 = 2;

/// Queue depth used by the CLI, matching the historical binding.
pub const DEFAULT_QUEUE_FRAMES: usize = 32;

/// One decoded audio frame for one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub program: u32,
    pub samples: Vec<i16>,
}

enum QueueItem {
    Frame(AudioFrame),
    End,
}

/// Producer half, held by the event handler on the callback thread.
#[derive(Clone)]
pub struct AudioProducer {
    tx: Sender<QueueItem>,
}

/// Consumer half, drained by the audio writer thread.
pub struct AudioConsumer {
    rx: Receiver<QueueItem>,
}

/// Creates the bounded producer/consumer pair.
pub fn queue(capacity: usize) -> (AudioProducer, AudioConsumer) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (AudioProducer { tx }, AudioConsumer { rx })
}

impl AudioProducer {
    /// Enqueues one frame, blocking while the queue is full.
    pub fn push(&self, frame: AudioFrame) -> Result<()> {
        self.tx
            .send(QueueItem::Frame(frame))
            .map_err(|_| Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "audio consumer gone")))
    }

    /// Requests shutdown. The consumer drains what is already queued, then
    /// terminates. Nothing may be pushed after this.
    pub fn finish(&self) {
        let _ = self.tx.send(QueueItem::End);
    }
}

impl AudioConsumer {
    /// Blocks for the next frame; `None` once the end marker is reached or
    /// the producer is gone.
    pub fn pop(&self) -> Option<AudioFrame> {
        match self.rx.recv() {
            Ok(QueueItem::Frame(frame)) => Some(frame),
            Ok(QueueItem::End) | Err(_) => None,
        }
    }

    /// Drains frames into the sink until end of stream.
    pub fn run(self, sink: &mut dyn AudioSink) -> Result<()> {
        let mut frames = 0u64;
        while let Some(frame) = self.pop() {
            sink.write(&frame.samples)?;
            frames += 1;
        }
        sink.finish()?;
        debug!(frames, "audio writer finished");
        Ok(())
    }
}

/// Destination for decoded audio samples.
pub trait AudioSink: Send {
    fn write(&mut self, samples: &[i16]) -> Result<()>;

    /// Called once after the last frame.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

fn wav_error(e: hound::Error) -> Error {
    match e {
        hound::Error::IoError(io) => Error::Io(io),
        other => Error::InvalidInput(other.to_string()),
    }
}

/// Writes a counted-size WAV container.
pub struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavSink {
    pub fn create(path: &Path) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: CHANNELS,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec).map_err(wav_error)?;
        Ok(Self {
            writer: Some(writer),
        })
    }
}

impl AudioSink for WavSink {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::InvalidInput("WAV writer already finalized".into()))?;
        for &sample in samples {
            writer.write_sample(sample).map_err(wav_error)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(wav_error)?;
        }
        Ok(())
    }
}

/// Writes headerless little-endian raw samples.
pub struct RawSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> RawSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> AudioSink for RawSink<W> {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        for &sample in samples {
            self.out.write_all(&sample.to_le_bytes())?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Discards audio. Used when no output was configured so the queue still
/// drains and the callback thread never stalls permanently.
pub struct NullSink;

impl AudioSink for NullSink {
    fn write(&mut self, _samples: &[i16]) -> Result<()> {
        Ok(())
    }
}

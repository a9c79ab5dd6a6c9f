//! Export sinks for composited frames.

use std::path::{Path, PathBuf};

use pitwall_common::error::{PitwallError, PitwallResult};

use crate::frame::CompositedFrame;

/// Consumes composited frames in order.
///
/// Returning an error from `accept` or `flush` is fatal to the session;
/// frames accepted before the error remain valid.
pub trait ExportSink {
    fn accept(&mut self, frame: CompositedFrame) -> PitwallResult<()>;

    /// Make every accepted frame durable.
    fn flush(&mut self) -> PitwallResult<()> {
        Ok(())
    }
}

/// Keeps every frame in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Vec<CompositedFrame>,
    flushes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[CompositedFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<CompositedFrame> {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of times `flush` was called.
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl ExportSink for MemorySink {
    fn accept(&mut self, frame: CompositedFrame) -> PitwallResult<()> {
        self.frames.push(frame);
        Ok(())
    }

    fn flush(&mut self) -> PitwallResult<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// Writes `frame_{index:06}.png` files, buffering up to `batch` frames.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    batch: usize,
    pending: Vec<CompositedFrame>,
    written: u64,
}

impl PngSequenceSink {
    /// Create `dir` if needed. A `batch` of 0 is treated as 1.
    pub fn create(dir: impl Into<PathBuf>, batch: usize) -> PitwallResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            batch: batch.max(1),
            pending: Vec::new(),
            written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames written to disk so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }

    /// Frames accepted but not yet on disk.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Frames stay pending until their file is saved, so a failed batch can be retried.
    fn write_pending(&mut self) -> PitwallResult<()> {
        let mut saved = 0;
        let mut outcome = Ok(());
        for frame in &self.pending {
            let path = self.frame_path(frame.index);
            if let Err(e) = frame.pixels.save(&path) {
                outcome = Err(PitwallError::sink(format!("{}: {e}", path.display())));
                break;
            }
            saved += 1;
        }
        self.pending.drain(..saved);
        self.written += saved as u64;
        if outcome.is_ok() {
            tracing::trace!(written = self.written, "PNG batch written");
        }
        outcome
    }
}

impl ExportSink for PngSequenceSink {
    fn accept(&mut self, frame: CompositedFrame) -> PitwallResult<()> {
        self.pending.push(frame);
        if self.pending.len() >= self.batch {
            self.write_pending()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> PitwallResult<()> {
        self.write_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use pitwall_telemetry_model::TelemetrySnapshot;

    fn frame(index: u64) -> CompositedFrame {
        CompositedFrame {
            index,
            timestamp_secs: index as f64,
            telemetry_secs: index as f64,
            snapshot: TelemetrySnapshot::new(index as f64),
            pixels: RgbaImage::from_pixel(2, 2, Rgba([index as u8, 0, 0, 255])),
        }
    }

    #[test]
    fn test_png_sink_batches_and_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PngSequenceSink::create(dir.path().join("out"), 2).unwrap();
        sink.accept(frame(0)).unwrap();
        assert_eq!(sink.written(), 0);
        sink.accept(frame(1)).unwrap();
        assert_eq!(sink.written(), 2);
        sink.accept(frame(7)).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.written(), 3);

        let path = sink.frame_path(7);
        assert!(path.ends_with("frame_000007.png"));
        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 0).0, [7, 0, 0, 255]);
    }

    #[test]
    fn test_failed_batch_keeps_frames_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut sink = PngSequenceSink::create(&out, 2).unwrap();

        std::fs::remove_dir(&out).unwrap();
        std::fs::write(&out, b"not a directory").unwrap();
        sink.accept(frame(0)).unwrap();
        assert!(sink.accept(frame(1)).is_err());
        assert_eq!(sink.pending(), 2);
        assert_eq!(sink.written(), 0);

        std::fs::remove_file(&out).unwrap();
        std::fs::create_dir(&out).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.pending(), 0);
        assert_eq!(sink.written(), 2);
        assert!(sink.frame_path(0).exists());
        assert!(sink.frame_path(1).exists());
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        sink.accept(frame(3)).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.flushes(), 1);
        assert_eq!(sink.frames()[0].index, 3);
    }
}

//! Decoded frame sources.
//!
//! The pipeline never decodes video itself; it pulls already-decoded frames
//! from a [`FrameSource`].

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use pitwall_common::clock::frame_times;
use pitwall_common::error::{PitwallError, PitwallResult};

use crate::frame::VideoFrame;

/// Yields decoded frames in presentation order.
pub trait FrameSource: Send {
    /// Next frame, or `None` at end of input.
    fn next_frame(&mut self) -> PitwallResult<Option<VideoFrame>>;
}

/// Frames held in memory.
#[derive(Debug, Default)]
pub struct VecFrameSource {
    frames: VecDeque<VideoFrame>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<VideoFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> PitwallResult<Option<VideoFrame>> {
        Ok(self.frames.pop_front())
    }
}

/// Synthetic frames of a single color at a constant frame rate.
///
/// Used for overlay-only renders and for validating a session without video.
#[derive(Debug, Clone)]
pub struct SolidFrameSource {
    width: u32,
    height: u32,
    fps: f64,
    count: u64,
    color: Rgba<u8>,
    next: u64,
}

impl SolidFrameSource {
    pub fn new(width: u32, height: u32, fps: f64, count: u64, color: Rgba<u8>) -> PitwallResult<Self> {
        if width == 0 || height == 0 {
            return Err(PitwallError::source("frame size must be non-zero"));
        }
        if !(fps.is_finite() && fps > 0.0) {
            return Err(PitwallError::source(format!("invalid frame rate {fps}")));
        }
        Ok(Self {
            width,
            height,
            fps,
            count,
            color,
            next: 0,
        })
    }

    /// Timestamps of every frame this source will produce.
    pub fn frame_times(&self) -> Vec<f64> {
        frame_times(self.count, self.fps)
    }
}

impl FrameSource for SolidFrameSource {
    fn next_frame(&mut self) -> PitwallResult<Option<VideoFrame>> {
        if self.next >= self.count {
            return Ok(None);
        }
        let index = self.next;
        self.next += 1;
        Ok(Some(VideoFrame::new(
            index,
            index as f64 / self.fps,
            RgbaImage::from_pixel(self.width, self.height, self.color),
        )))
    }
}

/// PNG or JPEG files from a directory, in file name order, at a fixed rate.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    fps: f64,
    next: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> PitwallResult<Self> {
        if !dir.is_dir() {
            return Err(PitwallError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }
        if !(fps.is_finite() && fps > 0.0) {
            return Err(PitwallError::source(format!("invalid frame rate {fps}")));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        paths.sort();

        tracing::info!(dir = %dir.display(), frames = paths.len(), fps, "Opened image sequence");
        Ok(Self {
            paths,
            fps,
            next: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn frame_times(&self) -> Vec<f64> {
        frame_times(self.paths.len() as u64, self.fps)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> PitwallResult<Option<VideoFrame>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        let index = self.next as u64;
        let pixels = image::open(path)
            .map_err(|e| PitwallError::source(format!("{}: {e}", path.display())))?
            .to_rgba8();
        self.next += 1;
        Ok(Some(VideoFrame::new(index, index as f64 / self.fps, pixels)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_source_counts_and_stamps() {
        let mut source = SolidFrameSource::new(8, 4, 25.0, 3, Rgba([1, 2, 3, 255])).unwrap();
        let mut stamps = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!((frame.width(), frame.height()), (8, 4));
            stamps.push((frame.index, frame.timestamp_secs));
        }
        assert_eq!(stamps, vec![(0, 0.0), (1, 0.04), (2, 0.08)]);
        assert_eq!(source.frame_times(), vec![0.0, 0.04, 0.08]);
    }

    #[test]
    fn test_solid_source_rejects_bad_rate() {
        assert!(SolidFrameSource::new(8, 4, 0.0, 3, Rgba([0, 0, 0, 255])).is_err());
    }

    #[test]
    fn test_image_sequence_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for (name, shade) in [("b.png", 20u8), ("a.png", 10), ("c.PNG", 30)] {
            RgbaImage::from_pixel(2, 2, Rgba([shade, 0, 0, 255]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), 10.0).unwrap();
        assert_eq!(source.len(), 3);
        let mut shades = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            shades.push(frame.pixels.get_pixel(0, 0).0[0]);
        }
        assert_eq!(shades, vec![10, 20, 30]);
    }

    #[test]
    fn test_missing_directory() {
        let err = ImageSequenceSource::open(Path::new("/nonexistent/frames"), 10.0).unwrap_err();
        assert!(matches!(err, PitwallError::FileNotFound { .. }));
    }
}

mod frames;

pub use frames::{ExtractedFrames, FrameDirectory};

use anyhow::Result;
use image::RgbImage;

/// Trait for decoded video sources
pub trait FrameSource {
    /// Decode a single frame by absolute index
    fn frame_at(&mut self, frame_index: usize) -> Result<RgbImage>;

    /// Number of frames in the video
    fn frame_count(&self) -> usize;

    /// Get the resolution of decoded frames
    fn resolution(&self) -> (u32, u32);
}

/// Image file that backs one frame in an exported dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFile {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

/// Maps absolute frame indices to the image files written for them
pub trait FrameLookup {
    /// `None` when the frame was never written out
    fn frame_file(&self, frame_index: usize) -> Option<FrameFile>;
}

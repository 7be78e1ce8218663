mod image_source;
mod video_source;

pub use image_source::ImageSource;
pub use video_source::VideoSource;

use crate::error::Result;
use image::RgbImage;

/// Trait for frame sources (a still image or a decoded video)
pub trait FrameSource {
    /// Read the next frame
    ///
    /// Returns `Ok(None)` once the source is exhausted. An `Err` means the
    /// frame could not be read; the video loop treats both as the end of the
    /// stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Get the resolution of source frames
    fn resolution(&self) -> (u32, u32);

    /// Number of frames the source reports, if known
    fn frame_count(&self) -> Option<u64>;
}

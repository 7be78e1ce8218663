mod image_sink;
mod video_sink;

pub use image_sink::ImageSink;
pub use video_sink::VideoSink;

use crate::error::Result;
use image::RgbImage;

/// Trait for output destinations
pub trait FrameSink {
    /// Write a frame to the output
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);

    /// Flush and close the output; further writes are errors
    fn finish(&mut self) -> Result<()>;
}

use super::FrameSink;
use crate::error::{MattingError, Result};
use crate::segmentation::resize_frame;
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Writes a single frame to an image file, format chosen by extension
pub struct ImageSink {
    path: PathBuf,
    width: u32,
    height: u32,
    written: bool,
}

impl ImageSink {
    pub fn new<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            width,
            height,
            written: false,
        }
    }
}

impl FrameSink for ImageSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if self.written {
            return Err(MattingError::InvalidInput(format!(
                "{} already holds a frame",
                self.path.display()
            )));
        }

        let frame = resize_frame(frame, self.width, self.height);
        frame.save(&self.path)?;
        self.written = true;

        tracing::info!("infer done! saved {}", self.path.display());
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

use super::FrameSource;
use crate::error::{MattingError, Result};
use image::RgbImage;
use std::path::Path;

/// A single still image, yielded once
pub struct ImageSource {
    frame: Option<RgbImage>,
    width: u32,
    height: u32,
}

impl ImageSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Reading image {}", path.display());

        let frame = image::open(path)
            .map_err(|err| {
                MattingError::InvalidInput(format!("cannot read image {}: {err}", path.display()))
            })?
            .to_rgb8();

        Ok(Self::from_frame(frame))
    }

    pub fn from_frame(frame: RgbImage) -> Self {
        let (width, height) = frame.dimensions();
        Self {
            frame: Some(frame),
            width,
            height,
        }
    }
}

impl FrameSource for ImageSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frame.take())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame_count(&self) -> Option<u64> {
        Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_exactly_one_frame() {
        let mut source = ImageSource::from_frame(RgbImage::new(8, 4));
        assert_eq!(source.resolution(), (8, 4));
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn missing_file_is_invalid_input() {
        let err = ImageSource::open("./no/such/image.jpg").err().unwrap();
        assert!(matches!(err, MattingError::InvalidInput(_)));
    }
}

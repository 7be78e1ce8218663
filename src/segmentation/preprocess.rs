use crate::config::ChannelOrder;
use crate::error::{MattingError, Result};
use image::{imageops, RgbImage};
use ndarray::Array4;

/// Frames are resized with a bilinear filter on the way in and out
const RESIZE_FILTER: imageops::FilterType = imageops::FilterType::Triangle;

/// Preprocessor for converting RGB frames to model input tensors
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
    channel_order: ChannelOrder,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32, channel_order: ChannelOrder) -> Self {
        Self {
            target_width,
            target_height,
            channel_order,
        }
    }

    /// Resize a frame to the model resolution
    pub fn resize(&self, frame: &RgbImage) -> RgbImage {
        resize_frame(frame, self.target_width, self.target_height)
    }

    /// Preprocess an RGB frame into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Convert to float and normalize to [0, 1]
    /// 2. Reorder channels to the model's channel order
    /// 3. Transpose from HWC to NCHW format
    ///
    /// The frame is not resized; call [`Preprocessor::resize`] first.
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, frame: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(MattingError::InvalidInput(format!(
                "cannot preprocess an empty {}x{} frame",
                width, height
            )));
        }

        let order = self.channel_order.rgb_indices();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in frame.enumerate_pixels() {
            for (channel, &source) in order.iter().enumerate() {
                tensor[[0, channel, y as usize, x as usize]] = pixel[source] as f32 / 255.0;
            }
        }

        Ok(tensor)
    }
}

/// Resize a frame to `width` x `height`, cloning it when it already matches
pub fn resize_frame(frame: &RgbImage, width: u32, height: u32) -> RgbImage {
    if frame.dimensions() == (width, height) {
        frame.clone()
    } else {
        imageops::resize(frame, width, height, RESIZE_FILTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 17 % 256) as u8, (y * 31 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn tensor_shape_and_range() {
        let preprocessor = Preprocessor::new(64, 36, ChannelOrder::Rgb);
        let frame = gradient(64, 36);
        let tensor = preprocessor.preprocess(&frame).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 36, 64]);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn extremes_map_to_zero_and_one() {
        let preprocessor = Preprocessor::new(2, 1, ChannelOrder::Rgb);
        let mut frame = RgbImage::new(2, 1);
        frame.put_pixel(0, 0, Rgb([0, 0, 0]));
        frame.put_pixel(1, 0, Rgb([255, 255, 255]));

        let tensor = preprocessor.preprocess(&frame).unwrap();
        for c in 0..3 {
            assert_eq!(tensor[[0, c, 0, 0]], 0.0);
            assert_eq!(tensor[[0, c, 0, 1]], 1.0);
        }
    }

    #[test]
    fn channel_order_is_applied() {
        let mut frame = RgbImage::new(1, 1);
        frame.put_pixel(0, 0, Rgb([255, 0, 51]));

        let rgb = Preprocessor::new(1, 1, ChannelOrder::Rgb)
            .preprocess(&frame)
            .unwrap();
        assert_eq!(rgb[[0, 0, 0, 0]], 1.0);
        assert_eq!(rgb[[0, 2, 0, 0]], 0.2);

        let bgr = Preprocessor::new(1, 1, ChannelOrder::Bgr)
            .preprocess(&frame)
            .unwrap();
        assert_eq!(bgr[[0, 0, 0, 0]], 0.2);
        assert_eq!(bgr[[0, 2, 0, 0]], 1.0);
    }

    #[test]
    fn layout_is_channel_height_width() {
        let preprocessor = Preprocessor::new(3, 2, ChannelOrder::Rgb);
        let mut frame = RgbImage::new(3, 2);
        frame.put_pixel(2, 1, Rgb([0, 255, 0]));

        let tensor = preprocessor.preprocess(&frame).unwrap();
        assert_eq!(tensor[[0, 1, 1, 2]], 1.0);
        assert_eq!(tensor.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn empty_frame_is_invalid_input() {
        let preprocessor = Preprocessor::new(4, 4, ChannelOrder::Rgb);
        let err = preprocessor.preprocess(&RgbImage::new(0, 0)).unwrap_err();
        assert!(matches!(err, MattingError::InvalidInput(_)));
    }

    #[test]
    fn resize_targets_model_resolution() {
        let preprocessor = Preprocessor::new(32, 18, ChannelOrder::Rgb);
        let resized = preprocessor.resize(&gradient(64, 36));
        assert_eq!(resized.dimensions(), (32, 18));

        let untouched = preprocessor.resize(&gradient(32, 18));
        assert_eq!(untouched, gradient(32, 18));
    }
}

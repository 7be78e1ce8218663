use crate::config::{BackgroundColor, ChannelOrder};
use crate::error::{MattingError, Result};
use image::{Rgb, RgbImage};
use ndarray::Array4;

/// Blend the predicted foreground over a solid background
///
/// Computes `fgr * pha + background * (1 - pha)` for every pixel of the first
/// batch element, then scales to 8 bits. Samples are clamped to [0, 255] and
/// truncated toward zero, so in-range values convert exactly like a plain
/// `as u8` cast.
///
/// # Arguments
/// * `fgr` - Foreground, shape [1, 3, H, W], in `order`
/// * `pha` - Alpha matte, shape [1, 1, H, W]
/// * `background` - RGB color in [0, 1]
/// * `order` - Channel order of `fgr`
///
/// Returns: an RGB frame of W x H
pub fn composite(
    fgr: &Array4<f32>,
    pha: &Array4<f32>,
    background: BackgroundColor,
    order: ChannelOrder,
) -> Result<RgbImage> {
    let _span = tracing::debug_span!("composite").entered();

    let (fgr_shape, pha_shape) = (fgr.shape(), pha.shape());
    if fgr_shape[0] < 1 || fgr_shape[1] != 3 || pha_shape[0] < 1 || pha_shape[1] != 1 {
        return Err(MattingError::Inference(format!(
            "expected fgr [1, 3, H, W] and pha [1, 1, H, W], got {:?} and {:?}",
            fgr_shape, pha_shape
        )));
    }
    if fgr_shape[2..] != pha_shape[2..] {
        return Err(MattingError::Inference(format!(
            "fgr {:?} and pha {:?} disagree on spatial size",
            fgr_shape, pha_shape
        )));
    }

    let (height, width) = (fgr_shape[2], fgr_shape[3]);
    let order = order.rgb_indices();
    let bg_rgb = background.to_rgb();
    let bg = order.map(|source| bg_rgb[source]);

    let mut frame = RgbImage::new(width as u32, height as u32);
    for (x, y, pixel) in frame.enumerate_pixels_mut() {
        let (x, y) = (x as usize, y as usize);
        let alpha = pha[[0, 0, y, x]] as f64;

        let mut rgb = [0u8; 3];
        for (channel, &target) in order.iter().enumerate() {
            let fg = fgr[[0, channel, y, x]] as f64;
            let blended = fg * alpha + bg[channel] * (1.0 - alpha);
            rgb[target] = (blended * 255.0).clamp(0.0, 255.0) as u8;
        }
        *pixel = Rgb(rgb);
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BG: BackgroundColor = BackgroundColor::new(0.47, 1.0, 0.6);

    fn expected_bg() -> Rgb<u8> {
        Rgb([(0.47f64 * 255.0) as u8, 255, (0.6f64 * 255.0) as u8])
    }

    fn uniform_fgr(rgb: [f32; 3], height: usize, width: usize) -> Array4<f32> {
        Array4::from_shape_fn((1, 3, height, width), |(_, c, _, _)| rgb[c])
    }

    #[test]
    fn transparent_foreground_shows_background() {
        let fgr = uniform_fgr([0.47, 1.0, 0.6], 4, 6);
        let pha = Array4::zeros((1, 1, 4, 6));

        let frame = composite(&fgr, &pha, BG, ChannelOrder::Rgb).unwrap();
        assert_eq!(frame.dimensions(), (6, 4));
        assert!(frame.pixels().all(|p| *p == expected_bg()));
        assert_eq!(expected_bg(), Rgb([119, 255, 153]));
    }

    #[test]
    fn opaque_alpha_ignores_background() {
        let fgr = Array4::from_shape_fn((1, 3, 3, 5), |(_, c, y, x)| {
            ((c * 7 + y * 5 + x) % 11) as f32 / 10.0
        });
        let pha = Array4::ones((1, 1, 3, 5));

        let on_green = composite(&fgr, &pha, BG, ChannelOrder::Rgb).unwrap();
        let on_black = composite(
            &fgr,
            &pha,
            BackgroundColor::new(0.0, 0.0, 0.0),
            ChannelOrder::Rgb,
        )
        .unwrap();

        assert_eq!(on_green, on_black);
        for (x, y, pixel) in on_green.enumerate_pixels() {
            for c in 0..3 {
                let expected = (fgr[[0, c, y as usize, x as usize]] as f64 * 255.0) as u8;
                assert_eq!(pixel[c], expected);
            }
        }
    }

    #[test]
    fn half_alpha_blends_evenly() {
        let fgr = uniform_fgr([1.0, 1.0, 1.0], 1, 1);
        let pha = Array4::from_elem((1, 1, 1, 1), 0.5);

        let frame = composite(
            &fgr,
            &pha,
            BackgroundColor::new(0.0, 0.0, 0.0),
            ChannelOrder::Rgb,
        )
        .unwrap();
        assert_eq!(*frame.get_pixel(0, 0), Rgb([127, 127, 127]));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let fgr = uniform_fgr([1.5, -0.2, 0.5], 1, 1);
        let pha = Array4::ones((1, 1, 1, 1));

        let frame = composite(&fgr, &pha, BG, ChannelOrder::Rgb).unwrap();
        assert_eq!(*frame.get_pixel(0, 0), Rgb([255, 0, 127]));
    }

    #[test]
    fn bgr_model_output_is_written_as_rgb() {
        // model channel 0 is blue
        let fgr = uniform_fgr([1.0, 0.0, 0.0], 1, 1);
        let pha = Array4::ones((1, 1, 1, 1));

        let frame = composite(&fgr, &pha, BG, ChannelOrder::Bgr).unwrap();
        assert_eq!(*frame.get_pixel(0, 0), Rgb([0, 0, 255]));

        let pha = Array4::zeros((1, 1, 1, 1));
        let transparent = composite(&fgr, &pha, BG, ChannelOrder::Bgr).unwrap();
        assert_eq!(*transparent.get_pixel(0, 0), expected_bg());
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let fgr = uniform_fgr([0.0, 0.0, 0.0], 4, 4);
        let pha = Array4::zeros((1, 1, 2, 2));
        let err = composite(&fgr, &pha, BG, ChannelOrder::Rgb).unwrap_err();
        assert!(matches!(err, MattingError::Inference(_)));

        let bad_channels = Array4::zeros((1, 2, 4, 4));
        let pha = Array4::zeros((1, 1, 4, 4));
        assert!(composite(&bad_channels, &pha, BG, ChannelOrder::Rgb).is_err());
    }
}

use crate::error::Result;
use ndarray::Array4;

/// Channels and downsampling stride of each recurrent tensor (MobileNetV3 RVM)
const RECURRENT_LAYOUT: [(usize, usize); 4] = [(16, 16), (20, 32), (40, 64), (64, 128)];

/// The four recurrent hidden states RVM carries from one frame to the next
///
/// A bundle is never modified: each inference call consumes one and returns
/// its successor, which replaces the old bundle wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrentState {
    pub r1: Array4<f32>,
    pub r2: Array4<f32>,
    pub r3: Array4<f32>,
    pub r4: Array4<f32>,
}

impl RecurrentState {
    /// Zero-filled state for a model running at `width` x `height`
    ///
    /// For 1920x1080 the shapes are 16x68x120, 20x34x60, 40x17x30 and 64x9x15.
    pub fn zeros(width: u32, height: u32) -> Self {
        let [s1, s2, s3, s4] = Self::shapes(width, height);
        Self {
            r1: Array4::zeros(s1),
            r2: Array4::zeros(s2),
            r3: Array4::zeros(s3),
            r4: Array4::zeros(s4),
        }
    }

    /// NCHW shapes of r1..r4 for a model running at `width` x `height`
    pub fn shapes(width: u32, height: u32) -> [(usize, usize, usize, usize); 4] {
        RECURRENT_LAYOUT.map(|(channels, stride)| {
            (
                1,
                channels,
                (height as usize).div_ceil(stride),
                (width as usize).div_ceil(stride),
            )
        })
    }

    pub fn tensors(&self) -> [&Array4<f32>; 4] {
        [&self.r1, &self.r2, &self.r3, &self.r4]
    }

    pub fn is_zero(&self) -> bool {
        self.tensors()
            .iter()
            .all(|tensor| tensor.iter().all(|&v| v == 0.0))
    }
}

/// Result of a single inference call
#[derive(Debug, Clone)]
pub struct MattingOutput {
    /// Foreground, shape [1, 3, H, W], model channel order
    pub fgr: Array4<f32>,
    /// Alpha matte, shape [1, 1, H, W]
    pub pha: Array4<f32>,
    /// State to feed into the next frame
    pub state: RecurrentState,
}

/// Trait for recurrent matting models
/// Allows swapping the ONNX backend for a scripted model in tests
pub trait MattingModel {
    /// Run the model once on a preprocessed `[1, 3, H, W]` frame
    ///
    /// # Arguments
    /// * `src` - Frame tensor from [`super::Preprocessor::preprocess`]
    /// * `state` - Hidden state returned by the previous call, or zeros
    fn infer(&mut self, src: &Array4<f32>, state: &RecurrentState) -> Result<MattingOutput>;

    /// Get the model's expected input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);

    /// State to use on the first frame of a stream
    fn initial_state(&self) -> RecurrentState {
        let (width, height) = self.input_size();
        RecurrentState::zeros(width, height)
    }
}

impl<M: MattingModel + ?Sized> MattingModel for Box<M> {
    fn infer(&mut self, src: &Array4<f32>, state: &RecurrentState) -> Result<MattingOutput> {
        (**self).infer(src, state)
    }

    fn input_size(&self) -> (u32, u32) {
        (**self).input_size()
    }

    fn initial_state(&self) -> RecurrentState {
        (**self).initial_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_for_1080p() {
        assert_eq!(
            RecurrentState::shapes(1920, 1080),
            [
                (1, 16, 68, 120),
                (1, 20, 34, 60),
                (1, 40, 17, 30),
                (1, 64, 9, 15),
            ]
        );
    }

    #[test]
    fn shapes_for_720p() {
        let shapes = RecurrentState::shapes(1280, 720);
        assert_eq!(shapes[0], (1, 16, 45, 80));
        assert_eq!(shapes[3], (1, 64, 6, 10));
    }

    #[test]
    fn zeros_are_zero() {
        let state = RecurrentState::zeros(1920, 1080);
        assert!(state.is_zero());
        assert_eq!(state.r3.shape(), &[1, 40, 17, 30]);
    }
}

//! Background replacement for images and videos with Robust Video Matting.
//!
//! Frames flow from a [`capture::FrameSource`] through the
//! [`segmentation::Preprocessor`], a [`segmentation::MattingModel`] and the
//! compositor into an [`output::FrameSink`]. The model's recurrent state is
//! carried from one frame to the next by [`pipeline::MattingPipeline`].

pub mod capture;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod segmentation;

pub use error::{MattingError, Result};

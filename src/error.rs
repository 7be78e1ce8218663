use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while matting an image or a video
#[derive(Debug, Error)]
pub enum MattingError {
    /// The model file is missing, unreadable or not a valid ONNX graph
    #[error("failed to load model from {}", path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: ort::Error,
    },

    /// The input image/video could not be opened, or a frame is malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The inference engine rejected a call or returned unexpected tensors
    #[error("inference failed: {0}")]
    Inference(String),

    /// FFmpeg failed while encoding or muxing the output video
    #[error("video output failed: {0}")]
    Video(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ort::Error> for MattingError {
    fn from(err: ort::Error) -> Self {
        MattingError::Inference(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MattingError {
    fn from(err: ndarray::ShapeError) -> Self {
        MattingError::Inference(format!("unexpected tensor shape: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, MattingError>;

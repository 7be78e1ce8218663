use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Default model resolution (width, height) of the bundled RVM export
pub const DEFAULT_MODEL_SIZE: (u32, u32) = (1920, 1080);

/// Frame rate of every written video
pub const OUTPUT_FPS: u32 = 25;

/// Background color the matte is composited onto, RGB in [0, 1]
pub const DEFAULT_BACKGROUND: BackgroundColor = BackgroundColor::new(0.47, 1.0, 0.6);

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Replace video backgrounds with Robust Video Matting", long_about = None)]
pub struct Args {
    /// Process a single image or a whole video
    #[arg(long, value_enum, default_value_t = Mode::Video)]
    pub mode: Mode,

    /// Path to the RVM model (ONNX file)
    #[arg(long, default_value = "./rvm_mobilenetv3_1080x1920.onnx")]
    pub weight: PathBuf,

    /// Input image or video
    #[arg(long, default_value = "./demo/TEST_05.mp4")]
    pub input: PathBuf,

    /// Output image or video
    #[arg(long, default_value = "./demo/static_TEST_05.mp4")]
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    #[value(alias = "img")]
    Image,
    Video,
}

/// Channel order of the model's `src` input and `fgr` output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Index into an RGB pixel for each model channel
    pub fn rgb_indices(self) -> [usize; 3] {
        match self {
            ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Bgr => [2, 1, 0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl BackgroundColor {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgb(self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }
}

/// Everything a [`crate::pipeline::MattingPipeline`] needs to run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: Mode,
    pub model_path: PathBuf,
    pub input_path: PathBuf,
    pub output_path: PathBuf,

    /// Resolution frames are resized to before inference (width, height)
    pub model_size: (u32, u32),

    /// Output resolution; `None` keeps the source resolution
    pub output_size: Option<(u32, u32)>,

    pub background: BackgroundColor,
    pub channel_order: ChannelOrder,
    pub fps: u32,

    /// Intra-op threads handed to ONNX Runtime
    pub intra_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Video,
            model_path: PathBuf::from("./rvm_mobilenetv3_1080x1920.onnx"),
            input_path: PathBuf::from("./demo/TEST_05.mp4"),
            output_path: PathBuf::from("./demo/static_TEST_05.mp4"),
            model_size: DEFAULT_MODEL_SIZE,
            output_size: None,
            background: DEFAULT_BACKGROUND,
            channel_order: ChannelOrder::Rgb,
            fps: OUTPUT_FPS,
            intra_threads: 4,
        }
    }
}

impl PipelineConfig {
    pub fn from_args(args: Args) -> Self {
        Self {
            mode: args.mode,
            model_path: args.weight,
            input_path: args.input,
            output_path: args.output,
            ..Self::default()
        }
    }
}

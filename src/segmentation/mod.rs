mod composite;
mod preprocess;
mod rvm;
pub mod types;

pub use composite::composite;
pub use preprocess::{resize_frame, Preprocessor};
pub use rvm::RobustVideoMatting;
pub use types::{MattingModel, MattingOutput, RecurrentState};

use crate::config::PipelineConfig;
use crate::error::Result;

/// Create the default matting model (RVM) described by `config`
pub fn create_default_model(config: &PipelineConfig) -> Result<Box<dyn MattingModel>> {
    let (width, height) = config.model_size;
    let model = RobustVideoMatting::new(&config.model_path, width, height, config.intra_threads)?;
    Ok(Box::new(model))
}

use anyhow::{Context, Result};
use clap::Parser;
use rvm_matting::config::{Args, PipelineConfig};
use rvm_matting::pipeline::{MattingPipeline, StreamEnd};
use rvm_matting::segmentation;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging, RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = PipelineConfig::from_args(args);

    tracing::info!("rvm-matting starting");
    tracing::info!("Mode: {:?}", config.mode);
    tracing::info!("Model: {}", config.model_path.display());
    tracing::info!("Input: {}", config.input_path.display());
    tracing::info!("Output: {}", config.output_path.display());

    let model =
        segmentation::create_default_model(&config).context("Failed to load matting model")?;

    let mut pipeline = MattingPipeline::new(model, config);
    let summary = pipeline.run().context("Matting failed")?;

    match summary.end {
        StreamEnd::Exhausted => tracing::info!("Processed {} frames", summary.frames),
        StreamEnd::ReadFailed(reason) => tracing::warn!(
            "Stopped after {} frames, input could not be read further: {}",
            summary.frames,
            reason
        ),
    }

    Ok(())
}

//! Frame loop tying the source, the matting model and the sink together.
//!
//! Frames are processed strictly in order: every inference call consumes the
//! recurrent state produced by the previous one, so there is nothing to
//! parallelize across frames.

use crate::capture::{FrameSource, ImageSource, VideoSource};
use crate::config::{Mode, PipelineConfig};
use crate::error::{MattingError, Result};
use crate::output::{FrameSink, ImageSink, VideoSink};
use crate::segmentation::{composite, MattingModel, Preprocessor, RecurrentState};
use image::RgbImage;
use std::time::{Duration, Instant};

/// Why the frame loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The source had no more frames
    Exhausted,
    /// A frame could not be read; everything before it was written
    ReadFailed(String),
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub inference_time: Duration,
    pub end: StreamEnd,
}

/// One processed frame and the state to carry into the next one
pub struct FrameResult {
    /// Composited frame at model resolution
    pub frame: RgbImage,
    pub state: RecurrentState,
    pub inference_time: Duration,
}

pub struct MattingPipeline<M: MattingModel> {
    model: M,
    preprocessor: Preprocessor,
    config: PipelineConfig,
}

impl<M: MattingModel> MattingPipeline<M> {
    pub fn new(model: M, config: PipelineConfig) -> Self {
        let (width, height) = model.input_size();
        if (width, height) != config.model_size {
            tracing::warn!(
                "Model runs at {}x{}, configured for {}x{}; using the model size",
                width,
                height,
                config.model_size.0,
                config.model_size.1
            );
        }
        let preprocessor = Preprocessor::new(width, height, config.channel_order);
        Self {
            model,
            preprocessor,
            config,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Open the configured input and output and run the configured mode
    pub fn run(&mut self) -> Result<RunSummary> {
        let input = self.config.input_path.clone();
        let output = self.config.output_path.clone();

        match self.config.mode {
            Mode::Image => {
                let mut source = ImageSource::open(&input)?;
                let (width, height) = self
                    .config
                    .output_size
                    .unwrap_or_else(|| self.model.input_size());
                let mut sink = ImageSink::new(&output, width, height);
                self.run_image(&mut source, &mut sink)
            }
            Mode::Video => {
                let mut source = VideoSource::open(&input)?;
                let (width, height) = self.config.output_size.unwrap_or(source.resolution());
                let mut sink = VideoSink::create(&output, width, height, self.config.fps)?;

                tracing::info!("Infer {} start ...", input.display());
                let summary = self.run_video(&mut source, &mut sink)?;
                tracing::info!(
                    "Infer {} done! {} frames in {}",
                    input.display(),
                    sink.frames_written(),
                    output.display()
                );
                Ok(summary)
            }
        }
    }

    /// Resize, preprocess, infer and composite a single frame
    pub fn process_frame(
        &mut self,
        frame: &RgbImage,
        state: &RecurrentState,
    ) -> Result<FrameResult> {
        let resized = self.preprocessor.resize(frame);
        let src = self.preprocessor.preprocess(&resized)?;

        let infer_start = Instant::now();
        let output = self.model.infer(&src, state)?;
        let inference_time = infer_start.elapsed();

        let frame = composite(
            &output.fgr,
            &output.pha,
            self.config.background,
            self.config.channel_order,
        )?;

        Ok(FrameResult {
            frame,
            state: output.state,
            inference_time,
        })
    }

    /// Matte the single frame of `source` from a zero state
    pub fn run_image<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<RunSummary>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let frame = source
            .next_frame()?
            .ok_or_else(|| MattingError::InvalidInput("input image has no frame".to_string()))?;

        let state = self.model.initial_state();
        let result = self.process_frame(&frame, &state)?;
        tracing::info!(
            "Infer 1/1 done! -> cost {:.1} ms",
            result.inference_time.as_secs_f64() * 1000.0
        );

        sink.write_frame(&result.frame)?;
        sink.finish()?;

        Ok(RunSummary {
            frames: 1,
            inference_time: result.inference_time,
            end: StreamEnd::Exhausted,
        })
    }

    /// Matte every frame of `source` in order, threading the recurrent state
    ///
    /// A frame that cannot be read ends the stream: it is logged and the run
    /// still succeeds with the frames written so far. The sink is finished on
    /// every path, including inference and write failures.
    pub fn run_video<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<RunSummary>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let result = self.stream_frames(source, sink);
        let finished = sink.finish();
        let summary = result?;
        finished?;

        tracing::info!(
            "Wrote {} frames, total inference {:.1} ms",
            summary.frames,
            summary.inference_time.as_secs_f64() * 1000.0
        );
        Ok(summary)
    }

    fn stream_frames<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<RunSummary>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let total = source
            .frame_count()
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        let (out_width, out_height) = sink.resolution();
        tracing::info!("Writing {} frames at {}x{}", total, out_width, out_height);

        let mut state = self.model.initial_state();
        let mut frames = 0u64;
        let mut inference_time = Duration::ZERO;

        let end = loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::info!("cannot read video: end of stream after {} frames", frames);
                    break StreamEnd::Exhausted;
                }
                Err(err) => {
                    tracing::warn!("cannot read video! skip! ({})", err);
                    break StreamEnd::ReadFailed(err.to_string());
                }
            };
            frames += 1;

            let result = self.process_frame(&frame, &state)?;
            state = result.state;
            inference_time += result.inference_time;
            tracing::info!(
                "Infer {}/{} done! -> cost {:.1} ms",
                frames,
                total,
                result.inference_time.as_secs_f64() * 1000.0
            );

            sink.write_frame(&result.frame)?;
            tracing::debug!("write {}/{} done.", frames, total);
        };

        Ok(RunSummary {
            frames,
            inference_time,
            end,
        })
    }
}

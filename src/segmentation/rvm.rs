use super::types::{MattingModel, MattingOutput, RecurrentState};
use crate::error::{MattingError, Result};
use ndarray::{Array4, Ix4};
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DynValue, TensorRef};
use std::path::Path;

const OUTPUT_NAMES: [&str; 6] = ["fgr", "pha", "r1o", "r2o", "r3o", "r4o"];

/// RobustVideoMatting model backed by ONNX Runtime
///
/// The exported graph takes `src` plus the recurrent inputs `r1i`..`r4i` and
/// returns `fgr`, `pha` and the next recurrent states `r1o`..`r4o`. The
/// session holds no state between calls; the caller threads it through.
pub struct RobustVideoMatting {
    session: Session,
    width: u32,
    height: u32,
}

impl RobustVideoMatting {
    /// Load an RVM model from an ONNX file
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `width`, `height` - Resolution the model was exported for
    /// * `intra_threads` - ONNX Runtime intra-op thread count
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
        intra_threads: usize,
    ) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading RVM model from {}", path.display());

        let session =
            build_session(path, intra_threads).map_err(|source| MattingError::ModelLoad {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::info!("Load {} done!", path.display());
        for input in &session.inputs {
            tracing::info!("Input: {} {:?}", input.name, input.input_type);
        }
        for output in &session.outputs {
            tracing::info!("Output: {} {:?}", output.name, output.output_type);
        }

        Ok(Self {
            session,
            width,
            height,
        })
    }
}

/// Configure ONNX Runtime, preferring TensorRT, then CUDA, then CPU
fn build_session(path: &Path, intra_threads: usize) -> ort::Result<Session> {
    let session = Session::builder()?
        .with_execution_providers([
            TensorRTExecutionProvider::default().build(),
            CUDAExecutionProvider::default().build(),
        ])?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(path)?;
    Ok(session)
}

fn to_array4(value: &DynValue, name: &str) -> Result<Array4<f32>> {
    let array = value
        .try_extract_array::<f32>()
        .map_err(|err| MattingError::Inference(format!("output {name}: {err}")))?;
    array
        .to_owned()
        .into_dimensionality::<Ix4>()
        .map_err(|err| MattingError::Inference(format!("output {name} is not 4-D: {err}")))
}

fn check_shape(name: &str, actual: &Array4<f32>, expected: &[usize]) -> Result<()> {
    if actual.shape() != expected {
        return Err(MattingError::Inference(format!(
            "output {name} has shape {:?}, expected {:?}",
            actual.shape(),
            expected
        )));
    }
    Ok(())
}

impl MattingModel for RobustVideoMatting {
    fn infer(&mut self, src: &Array4<f32>, state: &RecurrentState) -> Result<MattingOutput> {
        let _span = tracing::debug_span!("rvm_infer").entered();

        let inputs = ort::inputs![
            "src" => TensorRef::from_array_view(src.view())?,
            "r1i" => TensorRef::from_array_view(state.r1.view())?,
            "r2i" => TensorRef::from_array_view(state.r2.view())?,
            "r3i" => TensorRef::from_array_view(state.r3.view())?,
            "r4i" => TensorRef::from_array_view(state.r4.view())?,
        ];

        let outputs = self.session.run(inputs)?;

        let mut tensors = Vec::with_capacity(OUTPUT_NAMES.len());
        for name in OUTPUT_NAMES {
            let value = outputs
                .get(name)
                .ok_or_else(|| MattingError::Inference(format!("model has no output {name}")))?;
            tensors.push(to_array4(value, name)?);
        }
        drop(outputs);

        let mut tensors = tensors.into_iter();
        let mut next = || {
            tensors
                .next()
                .ok_or_else(|| MattingError::Inference("missing model output".to_string()))
        };
        let (fgr, pha) = (next()?, next()?);
        let next_state = RecurrentState {
            r1: next()?,
            r2: next()?,
            r3: next()?,
            r4: next()?,
        };

        let (height, width) = (src.shape()[2], src.shape()[3]);
        check_shape("fgr", &fgr, &[1, 3, height, width])?;
        check_shape("pha", &pha, &[1, 1, height, width])?;
        for (name, (new, old)) in ["r1o", "r2o", "r3o", "r4o"]
            .into_iter()
            .zip(next_state.tensors().into_iter().zip(state.tensors()))
        {
            check_shape(name, new, old.shape())?;
        }

        Ok(MattingOutput {
            fgr,
            pha,
            state: next_state,
        })
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_a_load_error() {
        let result = RobustVideoMatting::new("./does/not/exist.onnx", 1920, 1080, 1);
        match result {
            Err(MattingError::ModelLoad { path, .. }) => {
                assert_eq!(path, Path::new("./does/not/exist.onnx"));
            }
            Err(other) => panic!("expected ModelLoad, got {other:?}"),
            Ok(_) => panic!("loading a missing model must fail"),
        }
    }

    #[test]
    fn shape_check_reports_mismatch() {
        let tensor = Array4::<f32>::zeros((1, 16, 68, 120));
        assert!(check_shape("r1o", &tensor, &[1, 16, 68, 120]).is_ok());
        assert!(matches!(
            check_shape("r1o", &tensor, &[1, 16, 45, 80]),
            Err(MattingError::Inference(_))
        ));
    }
}

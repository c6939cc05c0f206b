use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use crate::detection::domain::face_detector::{FaceDetector, ModelLoadError};
use crate::shared::constants::{YOLO_MODEL_NAME, YOLO_MODEL_URL};
use crate::shared::model_resolver::{self, ModelSource, ProgressFn};

use super::onnx_blazeface_detector::OnnxBlazefaceDetector;
use super::onnx_yolo_detector::OnnxYoloDetector;

/// Which pretrained face model backs the detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectorBackend {
    #[default]
    Yolo,
    Blazeface,
}

impl DetectorBackend {
    pub fn name(&self) -> &'static str {
        match self {
            DetectorBackend::Yolo => "yolo",
            DetectorBackend::Blazeface => "blazeface",
        }
    }
}

impl fmt::Display for DetectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything needed to produce a ready detector.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorSpec {
    pub backend: DetectorBackend,
    /// Explicit model file; bypasses cache lookup and download.
    pub model_path: Option<PathBuf>,
    pub confidence: f64,
}

/// Resolves the model artifact and builds the detector. Blocking; run it
/// off the render thread (see `DetectorLoader::spawn_cancellable`).
pub fn create_detector(
    spec: &DetectorSpec,
    progress: Option<ProgressFn>,
    cancelled: &AtomicBool,
) -> Result<Box<dyn FaceDetector>, ModelLoadError> {
    match spec.backend {
        DetectorBackend::Yolo => {
            let path = match &spec.model_path {
                Some(path) => path.clone(),
                None => model_resolver::resolve(
                    &ModelSource::new(YOLO_MODEL_NAME, YOLO_MODEL_URL),
                    None,
                    progress,
                    cancelled,
                )?,
            };
            log::info!("Loading YOLO face model from {}", path.display());
            Ok(Box::new(OnnxYoloDetector::new(&path, spec.confidence)?))
        }
        DetectorBackend::Blazeface => {
            let path = spec
                .model_path
                .as_ref()
                .ok_or(ModelLoadError::MissingModelPath("blazeface"))?;
            log::info!("Loading BlazeFace model from {}", path.display());
            Ok(Box::new(OnnxBlazefaceDetector::new(path, spec.confidence)?))
        }
    }
}

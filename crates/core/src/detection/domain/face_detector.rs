use thiserror::Error;

use crate::shared::detection::DetectionResult;
use crate::shared::frame::Frame;
use crate::shared::model_resolver::ModelResolveError;

/// Domain interface for face detection.
///
/// One instance serves one caller at a time; `&mut self` lets backends keep
/// scratch buffers or sessions without interior locking.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, InferenceError>;
}

/// Per-frame detection failure. Recoverable: callers treat it as an empty result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("inference backend failed: {0}")]
    Backend(String),
    #[error("unexpected model output: {0}")]
    MalformedOutput(String),
    #[error("detector panicked: {0}")]
    Panicked(String),
}

impl InferenceError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        InferenceError::Backend(err.to_string())
    }
}

/// Model could not be made ready. Fatal to detection, never to the process.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("could not resolve model: {0}")]
    Resolve(#[from] ModelResolveError),
    #[error("could not create inference session: {0}")]
    Session(String),
    #[error("the {0} backend needs an explicit model path")]
    MissingModelPath(&'static str),
    #[error("model loader stopped before reporting a result")]
    LoaderGone,
}

impl ModelLoadError {
    pub fn session(err: impl std::fmt::Display) -> Self {
        ModelLoadError::Session(err.to_string())
    }
}

/// Rejects frames that have no decoded pixels yet.
pub fn ensure_has_pixels(frame: &Frame) -> Result<(), InferenceError> {
    if frame.has_pixels() {
        Ok(())
    } else {
        Err(InferenceError::EmptyFrame {
            width: frame.width(),
            height: frame.height(),
        })
    }
}

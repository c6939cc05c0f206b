use std::path::Path;

use crate::detection::domain::face_detector::ModelLoadError;

/// Return the preferred ONNX execution providers for the current platform.
///
/// ONNX Runtime falls back to CPU when a listed provider is unavailable.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Builds an inference session for a model file on the preferred providers.
pub fn open_session(model_path: &Path) -> Result<ort::session::Session, ModelLoadError> {
    if !model_path.is_file() {
        return Err(ModelLoadError::Session(format!(
            "model file not found: {}",
            model_path.display()
        )));
    }
    log::debug!("Opening ONNX session for {}", model_path.display());
    ort::session::Session::builder()
        .map_err(ModelLoadError::session)?
        .with_execution_providers(preferred_execution_providers())
        .map_err(ModelLoadError::session)?
        .commit_from_file(model_path)
        .map_err(ModelLoadError::session)
}

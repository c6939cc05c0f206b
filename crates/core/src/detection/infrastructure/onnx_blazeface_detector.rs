/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// The short-range front-camera model: small, fast, tuned for faces close
/// to a webcam. Boxes are decoded against the fixed anchor grid and
/// clipped to the frame.
use std::path::Path;

use crate::detection::domain::face_detector::{
    ensure_has_pixels, FaceDetector, InferenceError, ModelLoadError,
};
use crate::detection::infrastructure::execution_provider::open_session;
use crate::detection::infrastructure::nms::{nms, Candidate};
use crate::shared::detection::DetectionResult;
use crate::shared::frame::Frame;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of anchors of the short-range model.
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output (box + 6 keypoints).
const REGRESSOR_STRIDE: usize = 16;

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, ModelLoadError> {
        let session = open_session(model_path)?;
        log::info!("BlazeFace model ready ({})", model_path.display());
        Ok(Self {
            session,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, InferenceError> {
        ensure_has_pixels(frame)?;

        let input_value = ort::value::Tensor::from_array(preprocess(frame, INPUT_SIZE))
            .map_err(InferenceError::backend)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(InferenceError::backend)?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(InferenceError::MalformedOutput(format!(
                "expected 2 outputs, got {}",
                outputs.len()
            )));
        }
        let regressors = outputs[0]
            .try_extract_array::<f32>()
            .map_err(InferenceError::backend)?;
        let scores = outputs[1]
            .try_extract_array::<f32>()
            .map_err(InferenceError::backend)?;
        let reg_data = regressors
            .as_slice()
            .ok_or_else(|| InferenceError::MalformedOutput("non-contiguous regressors".into()))?;
        let score_data = scores
            .as_slice()
            .ok_or_else(|| InferenceError::MalformedOutput("non-contiguous scores".into()))?;

        let mut candidates = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.confidence,
            frame.width(),
            frame.height(),
        );
        let kept = nms(&mut candidates, NMS_IOU_THRESH);

        Ok(kept.iter().map(Candidate::to_detection).collect())
    }
}

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// Short-range anchor grid: 16×16 cells with 2 anchors, 8×8 cells with 6.
fn generate_anchors() -> Vec<[f32; 2]> {
    let layers = [(8, 2), (16, 6)]; // (stride, anchors per cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, per_cell) in &layers {
        let grid = INPUT_SIZE as usize / stride;
        for y in 0..grid {
            for x in 0..grid {
                let cx = (x as f32 + 0.5) / grid as f32;
                let cy = (y as f32 + 0.5) / grid as f32;
                anchors.extend(std::iter::repeat([cx, cy]).take(per_cell));
            }
        }
    }
    anchors
}

fn decode(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    confidence: f64,
    frame_width: u32,
    frame_height: u32,
) -> Vec<Candidate> {
    let fw = frame_width as f32;
    let fh = frame_height as f32;
    let size = INPUT_SIZE as f32;

    score_data
        .iter()
        .zip(anchors)
        .enumerate()
        .filter_map(|(i, (&raw_score, anchor))| {
            let score = sigmoid(raw_score);
            let offset = i * REGRESSOR_STRIDE;
            if (score as f64) < confidence || offset + 4 > reg_data.len() {
                return None;
            }
            let cx = anchor[0] + reg_data[offset] / size;
            let cy = anchor[1] + reg_data[offset + 1] / size;
            let w = reg_data[offset + 2] / size;
            let h = reg_data[offset + 3] / size;

            Some(Candidate {
                x1: ((cx - w / 2.0) * fw).max(0.0) as f64,
                y1: ((cy - h / 2.0) * fh).max(0.0) as f64,
                x2: ((cx + w / 2.0) * fw).min(fw) as f64,
                y2: ((cy + h / 2.0) * fh).min(fh) as f64,
                score: score as f64,
            })
        })
        .collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

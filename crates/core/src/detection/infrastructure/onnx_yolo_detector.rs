/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Letterbox preprocessing, inference, confidence filtering and NMS. Boxes
/// are returned in frame pixel coordinates in corner-derived form; keypoint
/// columns of pose-style models are ignored.
use std::path::Path;

use crate::detection::domain::face_detector::{
    ensure_has_pixels, FaceDetector, InferenceError, ModelLoadError,
};
use crate::detection::infrastructure::execution_provider::open_session;
use crate::detection::infrastructure::nms::{nms, Candidate};
use crate::shared::detection::DetectionResult;
use crate::shared::frame::Frame;

/// Fallback input resolution when the model doesn't declare one.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Letterbox padding value (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model.
    ///
    /// The input resolution is read from the model's NCHW input shape,
    /// falling back to 640 for dynamic shapes.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, ModelLoadError> {
        let session = open_session(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { ref shape, .. }
                    if shape.len() >= 4 && shape[2] > 0 =>
                {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!("YOLO face model ready (input {input_size}x{input_size})");
        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, InferenceError> {
        ensure_has_pixels(frame)?;

        let letterboxed = letterbox(frame, self.input_size);
        let input_value =
            ort::value::Tensor::from_array(letterboxed.tensor).map_err(InferenceError::backend)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(InferenceError::backend)?;
        if outputs.len() == 0 {
            return Err(InferenceError::MalformedOutput(
                "model produced no outputs".into(),
            ));
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(InferenceError::backend)?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_slice()
            .ok_or_else(|| InferenceError::MalformedOutput("non-contiguous output".into()))?;

        let mut candidates = decode(data, &shape, self.confidence, &letterboxed.mapping)?;
        let kept = nms(&mut candidates, NMS_IOU_THRESH);

        Ok(kept.iter().map(Candidate::to_detection).collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Maps letterboxed model coordinates back to frame pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
struct LetterboxMapping {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl LetterboxMapping {
    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

struct Letterboxed {
    tensor: ndarray::Array4<f32>,
    mapping: LetterboxMapping,
}

/// Letterbox-resize a frame into a `target_size²` NCHW float tensor.
fn letterbox(frame: &Frame, target_size: u32) -> Letterboxed {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let size = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, size, size), PAD_VALUE);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbour resample into the padded window.
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Letterboxed {
        tensor,
        mapping: LetterboxMapping {
            scale,
            pad_x,
            pad_y,
        },
    }
}

// ---------------------------------------------------------------------------
// Output decoding
// ---------------------------------------------------------------------------

/// Decodes `[1, features, boxes]` or `[1, boxes, features]` output rows of
/// the form `[cx, cy, w, h, conf, ...]` into frame-space candidates.
fn decode(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    mapping: &LetterboxMapping,
) -> Result<Vec<Candidate>, InferenceError> {
    if shape.len() != 3 {
        return Err(InferenceError::MalformedOutput(format!(
            "expected a rank-3 output, got shape {shape:?}"
        )));
    }
    // Exported YOLO heads are usually transposed: fewer features than boxes.
    let transposed = shape[1] < shape[2];
    let (num_boxes, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_boxes * num_feats {
        return Err(InferenceError::MalformedOutput(format!(
            "output shape {shape:?} does not hold box rows"
        )));
    }

    let value = |i: usize, f: usize| -> f64 {
        if transposed {
            data[f * num_boxes + i] as f64
        } else {
            data[i * num_feats + f] as f64
        }
    };

    let mut candidates = Vec::new();
    for i in 0..num_boxes {
        let score = value(i, 4);
        if score < confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        let (x1, y1) = mapping.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = mapping.to_frame(cx + w / 2.0, cy + h / 2.0);
        candidates.push(Candidate {
            x1,
            y1,
            x2,
            y2,
            score,
        });
    }
    Ok(candidates)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn identity() -> LetterboxMapping {
        LetterboxMapping {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        }
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → 640: scale 3.2, content 640x320, pad_y 160
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let boxed = letterbox(&frame, 640);

        assert_eq!(boxed.tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(boxed.mapping.scale, 3.2, epsilon = 1e-9);
        assert_eq!(boxed.mapping.pad_x, 0);
        assert_eq!(boxed.mapping.pad_y, 160);
    }

    #[test]
    fn test_letterbox_fills_padding_and_content() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let boxed = letterbox(&frame, 640);
        let pad_y = boxed.mapping.pad_y as usize;

        assert!((boxed.tensor[[0, 0, pad_y + 1, 1]] - 1.0).abs() < 0.01);
        assert!((boxed.tensor[[0, 0, 0, 0]] - PAD_VALUE).abs() < 0.01);
    }

    #[test]
    fn test_mapping_undoes_letterbox() {
        let mapping = LetterboxMapping {
            scale: 2.0,
            pad_x: 0,
            pad_y: 40,
        };
        let (x, y) = mapping.to_frame(100.0, 140.0);
        assert_relative_eq!(x, 50.0);
        assert_relative_eq!(y, 50.0);
    }

    #[test]
    fn test_decode_row_major_output() {
        // Two boxes, 6 features each (cx, cy, w, h, conf, extra)
        let data = vec![
            60.0, 95.0, 100.0, 150.0, 0.9, 0.0, //
            10.0, 10.0, 4.0, 4.0, 0.1, 0.0,
        ];
        let out = decode(&data, &[1, 2, 6], 0.5, &identity()).unwrap();
        assert_eq!(out.len(), 1);
        let d = out[0].to_detection();
        assert_relative_eq!(d.x, 10.0);
        assert_relative_eq!(d.y, 20.0);
        assert_relative_eq!(d.width, 100.0);
        assert_relative_eq!(d.height, 150.0);
    }

    #[test]
    fn test_decode_transposed_output() {
        // 5 features x 8 boxes; only box 3 is confident.
        let boxes = 8;
        let mut data = vec![0.0f32; 5 * boxes];
        data[3] = 50.0; // cx
        data[boxes + 3] = 50.0; // cy
        data[2 * boxes + 3] = 20.0; // w
        data[3 * boxes + 3] = 10.0; // h
        data[4 * boxes + 3] = 0.8; // conf

        let out = decode(&data, &[1, 5, boxes], 0.5, &identity()).unwrap();
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].x1, 40.0);
        assert_relative_eq!(out[0].y1, 45.0);
        assert_relative_eq!(out[0].x2, 60.0);
        assert_relative_eq!(out[0].y2, 55.0);
    }

    #[test]
    fn test_decode_rejects_bad_rank() {
        let err = decode(&[0.0; 4], &[4], 0.5, &identity()).unwrap_err();
        assert!(matches!(err, InferenceError::MalformedOutput(_)));
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let err = decode(&[0.0; 4], &[1, 2, 6], 0.5, &identity()).unwrap_err();
        assert!(matches!(err, InferenceError::MalformedOutput(_)));
    }
}

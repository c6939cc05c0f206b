pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
/// YOLO11n-pose fine-tuned on WIDER FACE, published as a release asset of
/// the faceguard project. Pinned to the v0.1.0 tag so the file never changes
/// under a cached copy.
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Application directory name under the platform cache/config dirs.
pub const APP_DIR_NAME: &str = "FaceWatch";

/// Nominal render loop period.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Lime.
pub const HIGHLIGHT_COLOR: [u8; 3] = [0, 255, 0];
pub const STROKE_WIDTH: u32 = 2;

/// Upper bound on ticks skipped after consecutive inference failures.
pub const MAX_BACKOFF_TICKS: u32 = 16;

pub mod detector_factory;
pub mod detector_loader;
pub mod execution_provider;
mod nms;
pub mod onnx_blazeface_detector;
pub mod onnx_yolo_detector;

pub mod detector_loader;
pub mod execution_provider;
pub mod onnx_blazeface_detector;

pub mod camera_source;
pub mod snapshot_writer;
pub mod surface_encoder;

pub mod ffmpeg_camera_source;
pub mod ffmpeg_surface_encoder;
pub mod png_snapshot_writer;

pub mod coordinate_mapper;
pub mod frame_geometry;
pub mod overlay_renderer;
pub mod overlay_style;
pub mod surface;

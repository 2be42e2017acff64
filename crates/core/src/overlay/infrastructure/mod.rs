mod glyphs;
pub mod raster_overlay_renderer;

use std::path::Path;

use crate::shared::frame::Frame;

/// Persists a still of the surface as a PNG.
pub trait SnapshotWriter: Send {
    /// Writes `frame` scaled to `size` when it differs from the frame's own.
    fn write_png(
        &self,
        path: &Path,
        frame: &Frame,
        size: (u32, u32),
    ) -> Result<(), Box<dyn std::error::Error>>;
}

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ImageEncoder, RgbImage};

use crate::shared::frame::Frame;
use crate::video::domain::snapshot_writer::SnapshotWriter;

/// PNG encoding via the `image` crate, independent of the file extension.
#[derive(Default)]
pub struct PngSnapshotWriter;

impl PngSnapshotWriter {
    pub fn new() -> Self {
        Self
    }
}

impl SnapshotWriter for PngSnapshotWriter {
    fn write_png(
        &self,
        path: &Path,
        frame: &Frame,
        size: (u32, u32),
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let img = RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("Failed to create image from frame data")?;
        let img = if (img.width(), img.height()) == size {
            img
        } else {
            imageops::resize(&img, size.0, size.1, FilterType::Triangle)
        };

        let out = BufWriter::new(File::create(path)?);
        PngEncoder::new(out).write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        log::info!("Snapshot saved to {}", path.display());
        Ok(())
    }
}

use std::path::Path;

use crate::shared::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    Vp9,
    Vp8,
    Mpeg4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    WebM,
    Mp4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingFormat {
    pub codec: VideoCodec,
    pub container: Container,
}

impl RecordingFormat {
    /// VP9 in WebM.
    pub const fn preferred() -> Self {
        Self {
            codec: VideoCodec::Vp9,
            container: Container::WebM,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self.container {
            Container::WebM => "webm",
            Container::Mp4 => "mp4",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match (self.container, self.codec) {
            (Container::WebM, VideoCodec::Vp9) => "video/webm;codecs=vp9",
            (Container::WebM, _) => "video/webm",
            (Container::Mp4, _) => "video/mp4",
        }
    }
}

impl std::fmt::Display for RecordingFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// One unit of encoded output, in encoder time base (`1 / fps`).
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedChunk {
    pub data: Vec<u8>,
    pub pts: i64,
    pub keyframe: bool,
}

/// Turns surface frames into encoded chunks and chunks into a file.
///
/// Lifecycle: `start`, any number of `encode`, `finish`, then `assemble`
/// with every chunk produced since `start`.
pub trait SurfaceEncoder: Send {
    fn supports(&self, format: &RecordingFormat) -> bool;

    /// Format used when the preferred one is unsupported.
    fn default_format(&self) -> RecordingFormat;

    fn start(
        &mut self,
        format: &RecordingFormat,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn encode(&mut self, frame: &Frame) -> Result<Vec<EncodedChunk>, Box<dyn std::error::Error>>;

    /// Flushes delayed output.
    fn finish(&mut self) -> Result<Vec<EncodedChunk>, Box<dyn std::error::Error>>;

    fn assemble(
        &mut self,
        chunks: &[EncodedChunk],
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>>;
}

/// The preferred format when supported, otherwise the encoder's default.
pub fn choose_format(encoder: &dyn SurfaceEncoder) -> RecordingFormat {
    let preferred = RecordingFormat::preferred();
    if encoder.supports(&preferred) {
        preferred
    } else {
        encoder.default_format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSupport(bool);

    impl SurfaceEncoder for FixedSupport {
        fn supports(&self, _format: &RecordingFormat) -> bool {
            self.0
        }
        fn default_format(&self) -> RecordingFormat {
            RecordingFormat {
                codec: VideoCodec::Mpeg4,
                container: Container::Mp4,
            }
        }
        fn start(
            &mut self,
            _format: &RecordingFormat,
            _width: u32,
            _height: u32,
            _fps: u32,
        ) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
        fn encode(&mut self, _frame: &Frame) -> Result<Vec<EncodedChunk>, Box<dyn std::error::Error>> {
            Ok(vec![])
        }
        fn finish(&mut self) -> Result<Vec<EncodedChunk>, Box<dyn std::error::Error>> {
            Ok(vec![])
        }
        fn assemble(
            &mut self,
            _chunks: &[EncodedChunk],
            _path: &Path,
        ) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
    }

    #[test]
    fn test_choose_preferred_when_supported() {
        assert_eq!(choose_format(&FixedSupport(true)), RecordingFormat::preferred());
    }

    #[test]
    fn test_choose_default_otherwise() {
        let f = choose_format(&FixedSupport(false));
        assert_eq!(f.extension(), "mp4");
    }

    #[test]
    fn test_preferred_is_vp9_webm() {
        let f = RecordingFormat::preferred();
        assert_eq!(f.extension(), "webm");
        assert_eq!(f.to_string(), "video/webm;codecs=vp9");
    }
}

use std::path::Path;

use crate::shared::frame::Frame;
use crate::video::domain::surface_encoder::{
    Container, EncodedChunk, RecordingFormat, SurfaceEncoder, VideoCodec,
};

const BIT_RATE: usize = 2_500_000;

/// Encodes surface frames with libavcodec and muxes the buffered chunks with
/// libavformat.
///
/// The opened encoder is kept until `assemble` so the muxer can copy its
/// codec parameters (extradata included) into the output stream.
pub struct FfmpegSurfaceEncoder {
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    format: Option<RecordingFormat>,
    width: u32,
    height: u32,
    fps: i32,
    frame_count: i64,
}

// Safety: FfmpegSurfaceEncoder is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegSurfaceEncoder {}

impl FfmpegSurfaceEncoder {
    pub fn new() -> Self {
        Self {
            encoder: None,
            scaler: None,
            format: None,
            width: 0,
            height: 0,
            fps: 0,
            frame_count: 0,
        }
    }
}

impl Default for FfmpegSurfaceEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn find_codec(codec: VideoCodec) -> Option<ffmpeg_next::codec::Codec> {
    if ffmpeg_next::init().is_err() {
        return None;
    }
    match codec {
        VideoCodec::Vp9 => ffmpeg_next::encoder::find_by_name("libvpx-vp9")
            .or_else(|| ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::VP9)),
        VideoCodec::Vp8 => ffmpeg_next::encoder::find_by_name("libvpx")
            .or_else(|| ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::VP8)),
        VideoCodec::Mpeg4 => ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4),
    }
}

fn muxer_name(container: Container) -> &'static str {
    match container {
        Container::WebM => "webm",
        Container::Mp4 => "mp4",
    }
}

fn codec_options(codec: VideoCodec) -> ffmpeg_next::Dictionary<'static> {
    let mut opts = ffmpeg_next::Dictionary::new();
    if matches!(codec, VideoCodec::Vp9 | VideoCodec::Vp8) {
        opts.set("deadline", "realtime");
        opts.set("cpu-used", "8");
    }
    opts
}

impl SurfaceEncoder for FfmpegSurfaceEncoder {
    fn supports(&self, format: &RecordingFormat) -> bool {
        let container_ok = match (format.container, format.codec) {
            (Container::WebM, VideoCodec::Mpeg4) => false,
            (Container::Mp4, _) | (Container::WebM, _) => true,
        };
        container_ok && find_codec(format.codec).is_some()
    }

    fn default_format(&self) -> RecordingFormat {
        let vp8 = RecordingFormat {
            codec: VideoCodec::Vp8,
            container: Container::WebM,
        };
        if find_codec(VideoCodec::Vp8).is_some() {
            vp8
        } else {
            RecordingFormat {
                codec: VideoCodec::Mpeg4,
                container: Container::Mp4,
            }
        }
    }

    fn start(
        &mut self,
        format: &RecordingFormat,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let codec = find_codec(format.codec)
            .ok_or_else(|| format!("No encoder available for {format}"))?;

        let fps_i = if fps == 0 { 30 } else { fps as i32 };

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps_i));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps_i, 1)));
        encoder_ctx.set_bit_rate(BIT_RATE);
        // Both WebM and MP4 muxers want codec headers out of band.
        encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);

        let encoder = encoder_ctx.open_with(codec_options(format.codec))?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        log::info!("Recording encoder: {} {width}x{height} @ {fps_i} fps", codec.name());

        self.encoder = Some(encoder);
        self.scaler = Some(scaler);
        self.format = Some(*format);
        self.width = width;
        self.height = height;
        self.fps = fps_i;
        self.frame_count = 0;
        Ok(())
    }

    fn encode(&mut self, frame: &Frame) -> Result<Vec<EncodedChunk>, Box<dyn std::error::Error>> {
        let encoder = self.encoder.as_mut().ok_or("FfmpegSurfaceEncoder: not started")?;
        let scaler = self.scaler.as_mut().ok_or("FfmpegSurfaceEncoder: not started")?;
        if frame.width() != self.width || frame.height() != self.height || frame.channels() != 3 {
            return Err(format!(
                "Frame {}x{}x{} does not match encoder {}x{}x3",
                frame.width(),
                frame.height(),
                frame.channels(),
                self.width,
                self.height
            )
            .into());
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            self.width,
            self.height,
        );
        let stride = rgb_frame.stride(0);
        let row_len = self.width as usize * 3;
        let data = rgb_frame.data_mut(0);
        for (row, src) in frame.data().chunks_exact(row_len).enumerate() {
            let dst_start = row * stride;
            data[dst_start..dst_start + row_len].copy_from_slice(src);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.frame_count));
        self.frame_count += 1;

        encoder.send_frame(&yuv_frame)?;
        Ok(drain(encoder))
    }

    fn finish(&mut self) -> Result<Vec<EncodedChunk>, Box<dyn std::error::Error>> {
        let encoder = self.encoder.as_mut().ok_or("FfmpegSurfaceEncoder: not started")?;
        encoder.send_eof()?;
        Ok(drain(encoder))
    }

    fn assemble(
        &mut self,
        chunks: &[EncodedChunk],
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let encoder = self.encoder.take().ok_or("FfmpegSurfaceEncoder: not started")?;
        let format = self.format.take().ok_or("FfmpegSurfaceEncoder: not started")?;
        self.scaler = None;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut octx = ffmpeg_next::format::output_as(path, muxer_name(format.container))?;
        let mut ost = octx.add_stream(encoder.codec())?;
        ost.set_parameters(&encoder);
        ost.set_time_base(ffmpeg_next::Rational(1, self.fps));
        octx.write_header()?;

        let ost_time_base = octx
            .stream(0)
            .ok_or("Output stream missing after header")?
            .time_base();

        for chunk in chunks {
            let mut packet = ffmpeg_next::Packet::copy(&chunk.data);
            packet.set_pts(Some(chunk.pts));
            packet.set_dts(Some(chunk.pts));
            if chunk.keyframe {
                packet.set_flags(ffmpeg_next::codec::packet::Flags::KEY);
            }
            packet.set_stream(0);
            packet.rescale_ts(ffmpeg_next::Rational(1, self.fps), ost_time_base);
            packet.write_interleaved(&mut octx)?;
        }

        octx.write_trailer()?;
        log::info!(
            "Recording assembled: {} chunks -> {}",
            chunks.len(),
            path.display()
        );
        Ok(())
    }
}

fn drain(encoder: &mut ffmpeg_next::codec::encoder::video::Encoder) -> Vec<EncodedChunk> {
    let mut chunks = Vec::new();
    let mut encoded = ffmpeg_next::Packet::empty();
    while encoder.receive_packet(&mut encoded).is_ok() {
        chunks.push(EncodedChunk {
            data: encoded.data().map(<[u8]>::to_vec).unwrap_or_default(),
            pts: encoded.pts().unwrap_or(0),
            keyframe: encoded.is_key(),
        });
    }
    chunks
}

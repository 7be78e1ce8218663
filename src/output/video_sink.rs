use super::FrameSink;
use crate::error::{MattingError, Result};
use crate::segmentation::resize_frame;
use ffmpeg::encoder::video::Encoder as VideoEncoder;
use ffmpeg::software::scaling::{context::Context as Scaler, flag::Flags};
use ffmpeg::util::{format::pixel::Pixel, frame::video::Video};
use ffmpeg::Rational;
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::{Path, PathBuf};

/// MPEG-4 Part 2 video written frame by frame at a fixed frame rate
///
/// The container is finalized by [`FrameSink::finish`], or on drop if an
/// error path skipped it, so a partial run still leaves a playable file.
pub struct VideoSink {
    path: PathBuf,
    output: ffmpeg::format::context::Output,
    encoder: VideoEncoder,
    scaler: Scaler,
    rgb: Video,
    yuv: Video,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    width: u32,
    height: u32,
    frames_written: i64,
    finished: bool,
}

impl VideoSink {
    pub fn create<P: AsRef<Path>>(path: P, width: u32, height: u32, fps: u32) -> Result<Self> {
        let path = path.as_ref();
        ffmpeg::init().map_err(|err| video_error(path, format!("ffmpeg init failed: {err}")))?;

        let fps = i32::try_from(fps)
            .ok()
            .filter(|&fps| fps > 0)
            .ok_or_else(|| video_error(path, format!("invalid frame rate {fps}")))?;

        let mut output = ffmpeg::format::output(&path)
            .map_err(|err| video_error(path, format!("create failed: {err}")))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or_else(|| video_error(path, "mpeg4 encoder not available".to_string()))?;

        let encoder_time_base = Rational::new(1, fps);
        let mut stream = output
            .add_stream(codec)
            .map_err(|err| video_error(path, format!("add stream: {err}")))?;

        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|err| video_error(path, format!("video encoder: {err}")))?;
        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(Rational::new(fps, 1)));
        // roughly one bit per pixel, as OpenCV's FFmpeg writer configures
        encoder.set_bit_rate(width as usize * height as usize * fps as usize);
        encoder.set_gop(12);
        if global_header {
            encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder
            .open_as(codec)
            .map_err(|err| video_error(path, format!("open encoder: {err}")))?;
        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        output
            .write_header()
            .map_err(|err| video_error(path, format!("write header: {err}")))?;
        let stream_time_base = output
            .stream(0)
            .map(|stream| stream.time_base())
            .ok_or_else(|| video_error(path, "output stream vanished".to_string()))?;

        let scaler = Scaler::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            Flags::BILINEAR,
        )
        .map_err(|err| video_error(path, format!("scaler init failed: {err}")))?;

        tracing::info!(
            "Create video writer: {} ({}x{} @ {} fps)",
            path.display(),
            width,
            height,
            fps
        );

        Ok(Self {
            path: path.to_path_buf(),
            output,
            encoder,
            scaler,
            rgb: Video::new(Pixel::RGB24, width, height),
            yuv: Video::empty(),
            encoder_time_base,
            stream_time_base,
            width,
            height,
            frames_written: 0,
            finished: false,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written as u64
    }

    /// Copy packed RGB rows into the (possibly padded) ffmpeg frame
    fn fill_rgb(&mut self, frame: &RgbImage) {
        let stride = self.rgb.stride(0);
        let row_bytes = self.width as usize * 3;
        let plane = self.rgb.data_mut(0);
        for (dst, src) in plane
            .chunks_mut(stride)
            .zip(frame.as_raw().chunks(row_bytes))
        {
            dst[..row_bytes].copy_from_slice(src);
        }
    }

    /// Move every packet the encoder has ready into the container
    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        loop {
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    packet.set_stream(0);
                    packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
                    packet
                        .write_interleaved(&mut self.output)
                        .map_err(|err| video_error(&self.path, format!("write packet: {err}")))?;
                }
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => {
                    return Ok(())
                }
                Err(ffmpeg::Error::Eof) => return Ok(()),
                Err(err) => {
                    return Err(video_error(&self.path, format!("receive packet: {err}")));
                }
            }
        }
    }
}

impl FrameSink for VideoSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if self.finished {
            return Err(video_error(&self.path, "writer already finished".to_string()));
        }

        let frame = resize_frame(frame, self.width, self.height);
        self.fill_rgb(&frame);

        self.scaler
            .run(&self.rgb, &mut self.yuv)
            .map_err(|err| video_error(&self.path, format!("scale frame: {err}")))?;
        self.yuv.set_pts(Some(self.frames_written));

        self.encoder
            .send_frame(&self.yuv)
            .map_err(|err| video_error(&self.path, format!("send frame: {err}")))?;
        self.frames_written += 1;

        self.drain_packets()
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        self.encoder
            .send_eof()
            .map_err(|err| video_error(&self.path, format!("send eof: {err}")))?;
        self.drain_packets()?;
        self.output
            .write_trailer()
            .map_err(|err| video_error(&self.path, format!("write trailer: {err}")))?;

        tracing::info!(
            "Closed video writer {} after {} frames",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.finish() {
                tracing::warn!("Failed to finalize {}: {}", self.path.display(), err);
            }
        }
    }
}

fn video_error(path: &Path, message: String) -> MattingError {
    MattingError::Video(format!("{}: {message}", path.display()))
}

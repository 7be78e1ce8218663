use super::FrameSource;
use crate::error::{MattingError, Result};
use ffmpeg::decoder::video::Video as VideoDecoder;
use ffmpeg::software::scaling::{context::Context as Scaler, flag::Flags};
use ffmpeg::util::{format::pixel::Pixel, frame::video::Video};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::Path;

/// Frames decoded from the best video stream of a container
pub struct VideoSource {
    input: ffmpeg::format::context::Input,
    decoder: VideoDecoder,
    scaler: Option<Scaler>,
    stream_index: usize,
    frame_count: Option<u64>,
    frame_rate: Option<f64>,
    eof_sent: bool,
    decoded: Video,
    converted: Video,
}

impl VideoSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ffmpeg::init().map_err(|err| invalid(path, format!("ffmpeg init failed: {err}")))?;

        let input = ffmpeg::format::input(&path)
            .map_err(|err| invalid(path, format!("open failed: {err}")))?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| invalid(path, "no video stream found".to_string()))?;
        let stream_index = stream.index();
        let frame_count = u64::try_from(stream.frames()).ok().filter(|&n| n > 0);
        let frame_rate = [stream.avg_frame_rate(), stream.rate()]
            .into_iter()
            .find(|rate| rate.numerator() > 0 && rate.denominator() > 0)
            .map(f64::from);

        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|err| invalid(path, format!("video decoder: {err}")))?;

        tracing::info!(
            "Video capture: height {}, width {}, frame count {}, fps {}",
            decoder.height(),
            decoder.width(),
            frame_count.map_or_else(|| "unknown".to_string(), |n| n.to_string()),
            frame_rate.map_or_else(|| "unknown".to_string(), |fps| format!("{fps:.2}"))
        );

        Ok(Self {
            input,
            decoder,
            scaler: None,
            stream_index,
            frame_count,
            frame_rate,
            eof_sent: false,
            decoded: Video::empty(),
            converted: Video::empty(),
        })
    }

    /// Average frame rate the container declares, if any
    pub fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    /// Feed the decoder the next packet of our stream, or EOF once the
    /// container runs dry
    fn feed_decoder(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        loop {
            match packet.read(&mut self.input) {
                Ok(()) if packet.stream() == self.stream_index => {
                    return self
                        .decoder
                        .send_packet(&packet)
                        .map_err(|err| read_error(format!("send packet: {err}")));
                }
                Ok(()) => continue,
                Err(ffmpeg::Error::Eof) => {
                    self.eof_sent = true;
                    return self
                        .decoder
                        .send_eof()
                        .map_err(|err| read_error(format!("send eof: {err}")));
                }
                Err(err) => return Err(read_error(format!("read packet: {err}"))),
            }
        }
    }

    /// Convert the most recently decoded frame to packed RGB
    fn convert(&mut self) -> Result<RgbImage> {
        let (width, height) = (self.decoded.width(), self.decoded.height());
        let mut scaler = match self.scaler.take() {
            Some(scaler) => scaler,
            None => Scaler::get(
                self.decoded.format(),
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                Flags::BILINEAR,
            )
            .map_err(|err| read_error(format!("scaler init failed: {err}")))?,
        };

        scaler
            .run(&self.decoded, &mut self.converted)
            .map_err(|err| read_error(format!("scale frame: {err}")))?;
        self.scaler = Some(scaler);

        let stride = self.converted.stride(0);
        let row_bytes = width as usize * 3;
        let plane = self.converted.data(0);
        if height == 0 || plane.len() < stride * (height as usize - 1) + row_bytes {
            return Err(read_error("decoded plane smaller than expected".to_string()));
        }

        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in plane.chunks(stride).take(height as usize) {
            pixels.extend_from_slice(&row[..row_bytes]);
        }

        RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| read_error("frame buffer size mismatch".to_string()))
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        loop {
            match self.decoder.receive_frame(&mut self.decoded) {
                Ok(()) => return self.convert().map(Some),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => {
                    if self.eof_sent {
                        return Ok(None);
                    }
                    self.feed_decoder()?;
                }
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(err) => return Err(read_error(format!("receive frame: {err}"))),
            }
        }
    }

    fn resolution(&self) -> (u32, u32) {
        (self.decoder.width(), self.decoder.height())
    }

    fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }
}

fn invalid(path: &Path, message: String) -> MattingError {
    MattingError::InvalidInput(format!("{}: {message}", path.display()))
}

fn read_error(message: String) -> MattingError {
    MattingError::InvalidInput(format!("cannot read video frame: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_video_is_invalid_input() {
        let err = VideoSource::open("./no/such/video.mp4").err().unwrap();
        assert!(matches!(err, MattingError::InvalidInput(_)));
    }
}

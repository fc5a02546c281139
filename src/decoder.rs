//! Video decoding.
//!
//! The pipeline only needs one capability from a decoder: open a file and
//! hand out frames until the stream ends. That capability is the
//! [`VideoDecoder`] trait, with [`FrameSource`] as the per-file cursor.
//! [`FfmpegDecoder`] is the implementation used by the binary.
//!
//! FFmpeg also has its own console logging, separate from the Rust
//! [`log`](https://crates.io/crates/log) facade; [`set_ffmpeg_log_level`]
//! tunes it.

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as FfmpegVideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use image::{DynamicImage, RgbImage};

use crate::error::UnspoolError;

/// Opens videos for sequential decoding.
///
/// Implementations must be shareable across worker threads; each call to
/// [`open`](VideoDecoder::open) produces an independent [`FrameSource`].
pub trait VideoDecoder: Send + Sync {
    /// Open `path` for decoding.
    ///
    /// # Errors
    ///
    /// Returns [`UnspoolError::DecoderOpen`] when the file cannot be opened
    /// or holds no decodable video stream.
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, UnspoolError>;
}

/// A cursor over the frames of one opened video.
///
/// Dropping the source releases the decoder.
pub trait FrameSource {
    /// Decode the next frame, or return `None` at end of stream.
    ///
    /// A read or decode failure also ends the stream.
    fn next_frame(&mut self) -> Option<DynamicImage>;
}

/// FFmpeg-backed [`VideoDecoder`].
///
/// Decodes the best video stream of a file in presentation order and
/// converts every frame to 8-bit RGB.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegDecoder;

impl FfmpegDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, UnspoolError> {
        let open_error = |reason: String| UnspoolError::DecoderOpen {
            path: path.to_path_buf(),
            reason,
        };

        // Safe to call repeatedly and from several workers.
        ffmpeg_next::init()
            .map_err(|error| open_error(format!("FFmpeg initialisation failed: {error}")))?;

        let input =
            ffmpeg_next::format::input(&path).map_err(|error| open_error(error.to_string()))?;

        let (stream_index, decoder) = {
            let stream = input
                .streams()
                .best(Type::Video)
                .ok_or_else(|| open_error("no video stream".to_string()))?;
            let context = CodecContext::from_parameters(stream.parameters())
                .map_err(|error| open_error(error.to_string()))?;
            let decoder = context
                .decoder()
                .video()
                .map_err(|error| open_error(error.to_string()))?;
            (stream.index(), decoder)
        };

        log::debug!(
            "Opened {} (stream {stream_index}, {}x{})",
            path.display(),
            decoder.width(),
            decoder.height()
        );

        Ok(Box::new(FfmpegFrames {
            path: path.to_path_buf(),
            input,
            decoder,
            stream_index,
            scaler: None,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            eof_sent: false,
        }))
    }
}

/// Source geometry the cached scaler was built for.
type ScalerKey = (Pixel, u32, u32);

/// Pull-based frame cursor over an FFmpeg demuxer and decoder.
struct FfmpegFrames {
    path: PathBuf,
    input: Input,
    decoder: FfmpegVideoDecoder,
    stream_index: usize,
    scaler: Option<(ScalerKey, ScalingContext)>,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    eof_sent: bool,
}

impl FfmpegFrames {
    /// Convert the current `decoded_frame` to an RGB image.
    fn convert_current_frame(&mut self) -> Result<DynamicImage, UnspoolError> {
        let width = self.decoded_frame.width();
        let height = self.decoded_frame.height();
        let key = (self.decoded_frame.format(), width, height);

        let rebuild = !matches!(&self.scaler, Some((cached, _)) if *cached == key);
        if rebuild {
            let context = ScalingContext::get(
                key.0,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?;
            self.scaler = Some((key, context));
        }

        if let Some((_, scaler)) = self.scaler.as_mut() {
            scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;
        }

        let buffer = packed_rgb_rows(&self.rgb_frame, width, height);
        let image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            UnspoolError::FfmpegError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })?;
        Ok(DynamicImage::ImageRgb8(image))
    }

    fn end_stream(&mut self) {
        if let Err(error) = self.decoder.send_eof() {
            log::debug!("Flushing decoder for {} failed: {error}", self.path.display());
        }
        self.eof_sent = true;
    }
}

/// Copy the RGB24 plane of `frame` without FFmpeg's per-row padding.
fn packed_rgb_rows(frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 3;
    frame
        .data(0)
        .chunks(frame.stride(0).max(row_bytes))
        .take(height as usize)
        .flat_map(|row| &row[..row_bytes.min(row.len())])
        .copied()
        .collect()
}

impl FrameSource for FfmpegFrames {
    fn next_frame(&mut self) -> Option<DynamicImage> {
        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                return match self.convert_current_frame() {
                    Ok(image) => Some(image),
                    Err(error) => {
                        log::warn!(
                            "Frame conversion failed in {}, ending stream: {error}",
                            self.path.display()
                        );
                        None
                    }
                };
            }

            // Decoder is drained and no more input will come.
            if self.eof_sent {
                return None;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            log::debug!(
                                "Decoder rejected packet in {}, ending stream: {error}",
                                self.path.display()
                            );
                            self.end_stream();
                        }
                    }
                }
                Err(FfmpegError::Eof) => self.end_stream(),
                Err(error) => {
                    log::debug!(
                        "Read failed in {}, ending stream: {error}",
                        self.path.display()
                    );
                    self.end_stream();
                }
            }
        }
    }
}

/// FFmpeg console verbosity.
///
/// Setting a level makes FFmpeg suppress every message below that severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print nothing.
    Quiet,
    /// Only unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's own default).
    Warning,
    /// Informational messages.
    Info,
    /// Everything, including debug output.
    Debug,
}

impl FfmpegLogLevel {
    /// Parse a level name; `warn` is accepted for `warning`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Some(FfmpegLogLevel::Quiet),
            "fatal" => Some(FfmpegLogLevel::Fatal),
            "error" => Some(FfmpegLogLevel::Error),
            "warning" | "warn" => Some(FfmpegLogLevel::Warning),
            "info" => Some(FfmpegLogLevel::Info),
            "debug" => Some(FfmpegLogLevel::Debug),
            _ => None,
        }
    }

    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }
}

/// Set FFmpeg's console log level for the whole process.
///
/// This does **not** affect messages emitted through the `log` crate.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

//! Frame extraction from a staged video.
//!
//! [`FrameExtractor`] decodes one staged video through a [`VideoDecoder`]
//! and writes every frame as a numbered JPEG (`00000000.jpg`,
//! `00000001.jpg`, …). The staged video is removed once decoding ends,
//! whether it succeeded or not.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    fs,
    path::Path,
    sync::Arc,
};

use image::ImageFormat;

use crate::{decoder::VideoDecoder, error::UnspoolError, layout::frame_file_name};

/// Decodes staged videos into directories of numbered frame images.
#[derive(Clone)]
pub struct FrameExtractor {
    decoder: Arc<dyn VideoDecoder>,
}

impl Debug for FrameExtractor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FrameExtractor").finish_non_exhaustive()
    }
}

impl FrameExtractor {
    /// Create an extractor that decodes with `decoder`.
    pub fn new(decoder: Arc<dyn VideoDecoder>) -> Self {
        Self { decoder }
    }

    /// Decode `staged_video` into `output_dir` and return the frame count.
    ///
    /// Frames are numbered from zero with no gaps, in decode order. The
    /// first end-of-stream (or read failure) stops decoding. `output_dir`
    /// must exist. `staged_video` is deleted before this returns.
    ///
    /// # Errors
    ///
    /// - [`UnspoolError::DecoderOpen`] if the video cannot be opened; no
    ///   frame is written.
    /// - [`UnspoolError::ImageError`] or [`UnspoolError::IoError`] if a frame
    ///   image cannot be written. Frames written before the failure remain.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use unspool::{FfmpegDecoder, FrameExtractor};
    ///
    /// let extractor = FrameExtractor::new(Arc::new(FfmpegDecoder::new()));
    /// let frames = extractor.extract("/tmp/stage/clip1.mp4", "out/clip1")?;
    /// println!("wrote {frames} frames");
    /// # Ok::<(), unspool::UnspoolError>(())
    /// ```
    pub fn extract<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        staged_video: P,
        output_dir: Q,
    ) -> Result<u64, UnspoolError> {
        let staged_video = staged_video.as_ref();
        let result = self.decode_into(staged_video, output_dir.as_ref());

        if let Err(error) = fs::remove_file(staged_video) {
            log::warn!(
                "Failed to remove staged video {}: {error}",
                staged_video.display()
            );
        }

        result
    }

    fn decode_into(&self, staged_video: &Path, output_dir: &Path) -> Result<u64, UnspoolError> {
        let mut source = self.decoder.open(staged_video)?;

        let mut frame_count: u64 = 0;
        while let Some(frame) = source.next_frame() {
            let frame_path = output_dir.join(frame_file_name(frame_count));
            frame
                .into_rgb8()
                .save_with_format(&frame_path, ImageFormat::Jpeg)?;
            frame_count += 1;
        }

        log::debug!(
            "Decoded {frame_count} frame(s) from {} into {}",
            staged_video.display(),
            output_dir.display()
        );
        Ok(frame_count)
    }
}

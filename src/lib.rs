//! # unspool
//!
//! Unspool archived videos into still frames.
//!
//! `unspool` reads video members out of tar archives without unpacking them,
//! stages one video at a time in a scratch directory, decodes it with FFmpeg
//! (via [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)) and writes
//! every frame as a numbered JPEG. The frames are left in a directory tree
//! next to the archive, or packed into a new `<name>_decompressed.tar`.
//! Many archives can be converted at once on a worker pool.
//!
//! ## Quick Start
//!
//! ### Convert every archive matching a pattern
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use unspool::{ConvertOptions, FfmpegDecoder, OutputMode, PipelineDriver};
//!
//! let options = ConvertOptions::new()
//!     .with_mode(OutputMode::Archive)
//!     .with_jobs(4)
//!     .with_scratch_root("/scratch/unspool");
//! let driver = PipelineDriver::new(options, Arc::new(FfmpegDecoder::new()));
//! let summary = driver.run("datasets/**/*.tar").unwrap();
//! println!("{} frames from {} archives", summary.frames, summary.succeeded);
//! ```
//!
//! ### Convert a single archive
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use unspool::{ArchiveConverter, ConvertOptions, FfmpegDecoder};
//!
//! let converter = ArchiveConverter::new(ConvertOptions::new(), Arc::new(FfmpegDecoder::new()));
//! let report = converter.convert("videos.tar").unwrap();
//! for entry in &report.entries {
//!     println!("{}: {:?}", entry.member, entry.result);
//! }
//! ```
//!
//! ## Output layout
//!
//! For `videos.tar` holding `clip1.mp4`:
//!
//! - folder mode: `videos/clip1/00000000.jpg`, `videos/clip1/00000001.jpg`, …
//! - archive mode: `videos_decompressed.tar` with entry `clip1/00000000.jpg`, …
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`](https://crates.io/crates/log) facade;
//! install any logger (the `unspool` binary uses `env_logger`). FFmpeg's own
//! console output is tuned separately with [`set_ffmpeg_log_level`].
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod archive;
pub mod configuration;
pub mod convert;
pub mod decoder;
pub mod error;
pub mod frames;
pub mod layout;
pub mod pipeline;
pub mod progress;

pub use archive::{ArchiveReader, ArchiveWriter};
pub use configuration::{ConvertOptions, DEFAULT_VIDEO_EXTENSION, OutputMode};
pub use convert::{ArchiveConverter, ArchiveReport, EntryOutcome};
pub use decoder::{
    FfmpegDecoder, FfmpegLogLevel, FrameSource, VideoDecoder, set_ffmpeg_log_level,
};
pub use error::UnspoolError;
pub use frames::FrameExtractor;
pub use pipeline::{JobReport, PipelineDriver, PipelineSummary, resolve_inputs};
pub use progress::{OperationType, ProgressCallback, ProgressInfo};

//! Conversion configuration.
//!
//! [`ConvertOptions`] is a builder carrying everything a conversion job
//! needs besides the archive path: the output mode, the worker count, the
//! scratch root, the video extension to look for, the overwrite policy for
//! output archives, and an optional progress observer.
//!
//! # Example
//!
//! ```no_run
//! use unspool::{ConvertOptions, OutputMode};
//!
//! let options = ConvertOptions::new()
//!     .with_mode(OutputMode::Archive)
//!     .with_jobs(4)
//!     .with_scratch_root("/scratch/unspool");
//! ```

use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use crate::{
    error::UnspoolError,
    progress::{NoOpProgress, ProgressCallback},
};

/// Extension of video members picked up by default.
pub const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

/// Name of the scratch directory created under the system temp dir.
const DEFAULT_SCRATCH_DIR: &str = "unspool";

/// Where decoded frames end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Leave frames as loose files in a directory tree next to the archive.
    #[default]
    Folder,
    /// Pack each video's frames into a new `<stem>_decompressed.tar`.
    Archive,
}

impl FromStr for OutputMode {
    type Err = UnspoolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "folder" | "dir" => Ok(OutputMode::Folder),
            "archive" | "tar" => Ok(OutputMode::Archive),
            other => Err(UnspoolError::InvalidOptions(format!(
                "unknown mode {other:?} (expected folder or archive)"
            ))),
        }
    }
}

impl Display for OutputMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OutputMode::Folder => write!(f, "folder"),
            OutputMode::Archive => write!(f, "archive"),
        }
    }
}

/// Settings shared by every job of a pipeline run.
#[derive(Clone)]
pub struct ConvertOptions {
    pub(crate) mode: OutputMode,
    pub(crate) jobs: usize,
    pub(crate) scratch_root: PathBuf,
    pub(crate) video_extension: String,
    pub(crate) overwrite: bool,
    pub(crate) progress: Arc<dyn ProgressCallback>,
}

impl Debug for ConvertOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ConvertOptions")
            .field("mode", &self.mode)
            .field("jobs", &self.jobs)
            .field("scratch_root", &self.scratch_root)
            .field("video_extension", &self.video_extension)
            .field("overwrite", &self.overwrite)
            .finish_non_exhaustive()
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvertOptions {
    /// Create options with default settings.
    ///
    /// Defaults: folder mode, one job, `<temp dir>/unspool` as scratch root,
    /// `mp4` members, no overwrite, no progress callback.
    pub fn new() -> Self {
        Self {
            mode: OutputMode::default(),
            jobs: 1,
            scratch_root: std::env::temp_dir().join(DEFAULT_SCRATCH_DIR),
            video_extension: DEFAULT_VIDEO_EXTENSION.to_string(),
            overwrite: false,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Set the output mode.
    #[must_use]
    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the number of archives converted concurrently.
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Set the directory that holds staged videos and temporary frames.
    #[must_use]
    pub fn with_scratch_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.scratch_root = root.as_ref().to_path_buf();
        self
    }

    /// Set the extension that marks a member as a video (with or without
    /// the leading dot).
    #[must_use]
    pub fn with_video_extension(mut self, extension: &str) -> Self {
        self.video_extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Allow replacing existing output archives.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// The configured output mode.
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// The configured worker count.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// The configured scratch root.
    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// The configured video extension, without a leading dot.
    pub fn video_extension(&self) -> &str {
        &self.video_extension
    }

    /// Check the options for values no job could run with.
    ///
    /// # Errors
    ///
    /// Returns [`UnspoolError::InvalidOptions`] for a zero job count, an
    /// empty video extension, or an empty scratch root.
    pub fn validate(&self) -> Result<(), UnspoolError> {
        if self.jobs == 0 {
            return Err(UnspoolError::InvalidOptions(
                "job count must be at least 1".to_string(),
            ));
        }
        if self.video_extension.is_empty() {
            return Err(UnspoolError::InvalidOptions(
                "video extension cannot be empty".to_string(),
            ));
        }
        if self.scratch_root.as_os_str().is_empty() {
            return Err(UnspoolError::InvalidOptions(
                "scratch root cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

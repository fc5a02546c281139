//! Error types for the `unspool` crate.
//!
//! [`UnspoolError`] is the single error type returned by every fallible
//! operation. Variants carry the archive, member or file path involved so
//! a logged error names the offending input without extra context at the
//! call site.
//!
//! Errors fall into three scopes:
//!
//! - **Invocation**: [`NoInput`](UnspoolError::NoInput),
//!   [`InvalidPattern`](UnspoolError::InvalidPattern) and
//!   [`InvalidOptions`](UnspoolError::InvalidOptions) stop a pipeline run
//!   before any file is written.
//! - **Job**: [`ArchiveOpen`](UnspoolError::ArchiveOpen),
//!   [`ArchiveCreate`](UnspoolError::ArchiveCreate) and
//!   [`ArchiveWrite`](UnspoolError::ArchiveWrite) fail one archive; sibling
//!   archives keep going.
//! - **Entry**: everything else fails a single video member; the remaining
//!   members of the same archive are still converted.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `unspool` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UnspoolError {
    /// The input archive is missing, unreadable, or not a valid tar file.
    #[error("Cannot open archive {path}: {reason}")]
    ArchiveOpen {
        /// Archive that was passed to [`crate::ArchiveReader::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The requested member is not present in the archive.
    #[error("Member {member} not found in archive {archive}")]
    MemberNotFound {
        /// Archive that was searched.
        archive: PathBuf,
        /// Member name that was requested.
        member: String,
    },

    /// A member could not be copied out of the archive.
    #[error("Failed to extract {member} from {archive}: {reason}")]
    Extract {
        /// Archive being read.
        archive: PathBuf,
        /// Member being staged.
        member: String,
        /// Underlying reason the extraction failed.
        reason: String,
    },

    /// The decoder could not open a staged video.
    #[error("Cannot open video {path}: {reason}")]
    DecoderOpen {
        /// Staged video path handed to the decoder.
        path: PathBuf,
        /// Underlying reason reported by the decoder.
        reason: String,
    },

    /// The output archive could not be created.
    #[error("Cannot create archive {path}: {reason}")]
    ArchiveCreate {
        /// Output archive path.
        path: PathBuf,
        /// Underlying reason the create failed.
        reason: String,
    },

    /// Appending to or finalising the output archive failed.
    #[error("Failed to write archive {path}: {reason}")]
    ArchiveWrite {
        /// Output archive path.
        path: PathBuf,
        /// Underlying reason the write failed.
        reason: String,
    },

    /// The input pattern matched no archive files.
    #[error("No input archives match {pattern}")]
    NoInput {
        /// Pattern that was expanded.
        pattern: String,
    },

    /// The input pattern is malformed or does not denote tar archives.
    #[error("Invalid input pattern {pattern}: {reason}")]
    InvalidPattern {
        /// Pattern as given by the caller.
        pattern: String,
        /// Why the pattern was rejected.
        reason: String,
    },

    /// A [`ConvertOptions`](crate::ConvertOptions) value failed validation.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl UnspoolError {
    /// Returns `true` when this error aborts the whole archive rather than a
    /// single member.
    pub fn is_job_fatal(&self) -> bool {
        matches!(
            self,
            UnspoolError::ArchiveOpen { .. }
                | UnspoolError::ArchiveCreate { .. }
                | UnspoolError::ArchiveWrite { .. }
        )
    }
}

impl From<FfmpegError> for UnspoolError {
    fn from(error: FfmpegError) -> Self {
        UnspoolError::FfmpegError(error.to_string())
    }
}

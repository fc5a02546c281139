//! Per-archive conversion.
//!
//! [`ArchiveConverter`] takes one input archive through
//! `open → list → (stage → decode → emit) × N → close`. The staging and
//! decoding steps are shared; what happens to a finished frame directory is
//! decided by the output strategy for the configured
//! [`OutputMode`]:
//!
//! - **Folder**: frames are decoded straight into
//!   `<archive stem>/<member path>/` next to the archive and stay there.
//! - **Archive**: frames are decoded into a temporary directory under the
//!   scratch root, appended to `<archive stem>_decompressed.tar`, and the
//!   temporary directory is removed.
//!
//! A failure that affects only one member (it cannot be staged, decoded or
//! its frames cannot be written) is recorded in that member's
//! [`EntryOutcome`] and the remaining members are still converted. Failing
//! to open the input, or to create or write the output archive, fails the
//! whole archive.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use tempfile::TempDir;

use crate::{
    archive::{ArchiveReader, ArchiveWriter},
    configuration::{ConvertOptions, OutputMode},
    decoder::VideoDecoder,
    error::UnspoolError,
    frames::FrameExtractor,
    layout,
    progress::{OperationType, ProgressTracker},
};

/// Result of converting one video member.
#[derive(Debug)]
pub struct EntryOutcome {
    /// Member name inside the input archive.
    pub member: String,
    /// Number of frames written, or why the member failed.
    pub result: Result<u64, UnspoolError>,
}

/// Result of converting one archive.
#[derive(Debug)]
pub struct ArchiveReport {
    /// The input archive.
    pub archive: PathBuf,
    /// The folder-mode output root or the archive-mode output archive.
    pub output: PathBuf,
    /// One outcome per video member, in archive order.
    pub entries: Vec<EntryOutcome>,
}

impl ArchiveReport {
    /// Total frames written across all members.
    pub fn frames(&self) -> u64 {
        self.entries
            .iter()
            .filter_map(|entry| entry.result.as_ref().ok())
            .sum()
    }

    /// Number of members that failed.
    pub fn failed_entries(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.result.is_err())
            .count()
    }
}

/// Where one member's frames are written while it is being decoded.
enum FrameTarget {
    /// Final location in the folder-mode tree.
    Folder(PathBuf),
    /// Temporary directory under the scratch root.
    Scratch(TempDir),
}

impl FrameTarget {
    fn path(&self) -> &Path {
        match self {
            FrameTarget::Folder(path) => path,
            FrameTarget::Scratch(directory) => directory.path(),
        }
    }
}

/// What to do with a completed frame directory.
pub(crate) enum OutputStrategy {
    /// Keep frames in a directory tree rooted at `root`.
    ToFolder {
        /// Output root, `<archive dir>/<archive stem>`.
        root: PathBuf,
    },
    /// Append frames to an output archive.
    ToArchive {
        /// Writer for `<archive stem>_decompressed.tar`.
        writer: ArchiveWriter,
        /// Entry names already written.
        used_names: HashSet<String>,
    },
}

impl OutputStrategy {
    /// Set up the output side for `archive`.
    ///
    /// In archive mode this creates the output archive.
    ///
    /// # Errors
    ///
    /// Returns [`UnspoolError::ArchiveCreate`] if the output archive cannot
    /// be created.
    pub(crate) fn open(
        mode: OutputMode,
        archive: &Path,
        overwrite: bool,
    ) -> Result<Self, UnspoolError> {
        match mode {
            OutputMode::Folder => Ok(OutputStrategy::ToFolder {
                root: layout::folder_output_root(archive),
            }),
            OutputMode::Archive => {
                let writer =
                    ArchiveWriter::create(layout::decompressed_archive_path(archive), overwrite)?;
                Ok(OutputStrategy::ToArchive {
                    writer,
                    used_names: HashSet::new(),
                })
            }
        }
    }

    fn prepare(
        &self,
        archive: &Path,
        member: &str,
        options: &ConvertOptions,
    ) -> Result<FrameTarget, UnspoolError> {
        match self {
            OutputStrategy::ToFolder { root } => {
                let directory =
                    root.join(layout::member_relative_dir(member, &options.video_extension));
                fs::create_dir_all(&directory)?;
                Ok(FrameTarget::Folder(directory))
            }
            OutputStrategy::ToArchive { .. } => {
                let directory = tempfile::Builder::new()
                    .prefix(&format!("frames-{}", layout::staging_prefix(archive, member)))
                    .tempdir_in(&options.scratch_root)?;
                Ok(FrameTarget::Scratch(directory))
            }
        }
    }

    fn finalize(
        &mut self,
        member: &str,
        extension: &str,
        target: FrameTarget,
    ) -> Result<(), UnspoolError> {
        match (self, target) {
            (OutputStrategy::ToArchive { writer, used_names }, FrameTarget::Scratch(directory)) => {
                let arc_name = unique_arc_name(used_names, member, extension);
                if arc_name != layout::member_arc_name(member) {
                    log::warn!(
                        "Entry name for {member} already used in {}, storing it as {arc_name}",
                        writer.path().display()
                    );
                }

                writer.add_path(directory.path(), &arc_name)?;
                used_names.insert(arc_name);

                let path = directory.path().to_path_buf();
                if let Err(error) = directory.close() {
                    log::warn!(
                        "Failed to remove frame directory {}: {error}",
                        path.display()
                    );
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Finish the output side and return the output path.
    ///
    /// # Errors
    ///
    /// Returns [`UnspoolError::ArchiveWrite`] if the output archive cannot be
    /// finalised.
    pub(crate) fn close(self) -> Result<PathBuf, UnspoolError> {
        match self {
            OutputStrategy::ToFolder { root } => Ok(root),
            OutputStrategy::ToArchive { writer, .. } => writer.close(),
        }
    }

    /// Discard the output side after a job-fatal error.
    ///
    /// An incomplete output archive is deleted; folder output is left as is.
    pub(crate) fn abandon(self) {
        if let OutputStrategy::ToArchive { writer, .. } = self {
            writer.abandon();
        }
    }
}

/// Pick an unused entry name for `member`.
///
/// Prefers the base-name stem, then the member path without extension, then
/// that path with a numeric suffix.
fn unique_arc_name(used_names: &HashSet<String>, member: &str, extension: &str) -> String {
    let stem = layout::member_arc_name(member);
    if !used_names.contains(&stem) {
        return stem;
    }

    let relative = layout::member_relative_dir(member, extension)
        .to_string_lossy()
        .into_owned();
    let base = if relative.is_empty() { stem } else { relative };
    if !used_names.contains(&base) {
        return base;
    }

    (1..)
        .map(|counter| format!("{base}_{counter}"))
        .find(|candidate| !used_names.contains(candidate))
        .unwrap_or(base)
}

/// Converts whole archives, one at a time.
///
/// A converter is cheap to share: the pipeline driver hands the same
/// instance to every worker.
#[derive(Debug, Clone)]
pub struct ArchiveConverter {
    options: ConvertOptions,
    extractor: FrameExtractor,
}

impl ArchiveConverter {
    /// Create a converter using `decoder` for every video.
    pub fn new(options: ConvertOptions, decoder: Arc<dyn VideoDecoder>) -> Self {
        Self {
            options,
            extractor: FrameExtractor::new(decoder),
        }
    }

    /// The options this converter was built with.
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert every video member of `archive`.
    ///
    /// The scratch root must exist.
    ///
    /// # Errors
    ///
    /// Only job-fatal errors are returned: [`UnspoolError::ArchiveOpen`],
    /// [`UnspoolError::ArchiveCreate`] and [`UnspoolError::ArchiveWrite`].
    /// Member failures are reported in [`ArchiveReport::entries`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use unspool::{ArchiveConverter, ConvertOptions, FfmpegDecoder, OutputMode};
    ///
    /// let options = ConvertOptions::new().with_mode(OutputMode::Archive);
    /// let converter = ArchiveConverter::new(options, Arc::new(FfmpegDecoder::new()));
    /// let report = converter.convert("videos.tar")?;
    /// println!("{} frames -> {}", report.frames(), report.output.display());
    /// # Ok::<(), unspool::UnspoolError>(())
    /// ```
    pub fn convert<P: AsRef<Path>>(&self, archive: P) -> Result<ArchiveReport, UnspoolError> {
        let archive = archive.as_ref();
        log::info!("Converting {} ({} mode)", archive.display(), self.options.mode);

        let mut reader = ArchiveReader::open(archive)?;
        let mut strategy =
            OutputStrategy::open(self.options.mode, archive, self.options.overwrite)?;

        let videos: Vec<String> = reader
            .list()
            .iter()
            .filter(|member| layout::is_video_member(member, &self.options.video_extension))
            .cloned()
            .collect();
        log::debug!(
            "{} of {} member(s) in {} are videos",
            videos.len(),
            reader.list().len(),
            archive.display()
        );

        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::EntryConversion,
            Some(videos.len() as u64),
        );
        let mut entries = Vec::with_capacity(videos.len());

        for member in videos {
            match self.convert_entry(&mut reader, &mut strategy, archive, &member) {
                Err(error) if error.is_job_fatal() => {
                    log::error!("Aborting {}: {error}", archive.display());
                    reader.close();
                    strategy.abandon();
                    return Err(error);
                }
                result => {
                    match &result {
                        Ok(frames) => log::debug!("{member}: {frames} frame(s)"),
                        Err(error) => log::error!(
                            "Failed to convert {member} in {}: {error}",
                            archive.display()
                        ),
                    }
                    tracker.advance(&member, result.is_err());
                    entries.push(EntryOutcome { member, result });
                }
            }
        }

        reader.close();
        let output = strategy.close()?;

        let report = ArchiveReport {
            archive: archive.to_path_buf(),
            output,
            entries,
        };
        log::info!(
            "Finished {}: {} frame(s) from {} video(s), {} failed",
            archive.display(),
            report.frames(),
            report.entries.len(),
            report.failed_entries()
        );
        Ok(report)
    }

    fn convert_entry(
        &self,
        reader: &mut ArchiveReader,
        strategy: &mut OutputStrategy,
        archive: &Path,
        member: &str,
    ) -> Result<u64, UnspoolError> {
        let staging = tempfile::Builder::new()
            .prefix(&layout::staging_prefix(archive, member))
            .tempdir_in(&self.options.scratch_root)?;
        let staged = reader.extract(member, staging.path())?;

        let target = strategy.prepare(archive, member, &self.options)?;
        let extracted = self.extractor.extract(&staged, target.path());

        // A video that cannot be opened still gets its (empty) entry.
        if matches!(extracted, Ok(_) | Err(UnspoolError::DecoderOpen { .. })) {
            strategy.finalize(member, &self.options.video_extension, target)?;
        }

        let staging_path = staging.path().to_path_buf();
        if let Err(error) = staging.close() {
            log::warn!(
                "Failed to remove staging directory {}: {error}",
                staging_path.display()
            );
        }

        extracted
    }
}

//! Pipeline driver.
//!
//! [`PipelineDriver`] expands an input pattern to a list of tar archives and
//! runs one [`ArchiveConverter`] job per archive. With one job the archives
//! are converted in order on the calling thread; with more, a dedicated
//! [`rayon`] pool of exactly that many threads converts whole archives
//! concurrently and sends each [`JobReport`] back over a channel.
//!
//! A failed archive is logged and counted; it never stops the others.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use unspool::{ConvertOptions, FfmpegDecoder, OutputMode, PipelineDriver};
//!
//! let options = ConvertOptions::new()
//!     .with_mode(OutputMode::Folder)
//!     .with_jobs(4);
//! let driver = PipelineDriver::new(options, Arc::new(FfmpegDecoder::new()));
//! let summary = driver.run("datasets/**/*.tar")?;
//! println!("{}/{} archives converted", summary.succeeded, summary.total);
//! # Ok::<(), unspool::UnspoolError>(())
//! ```

use std::{
    fs,
    path::PathBuf,
    sync::{Arc, mpsc},
};

use crate::{
    configuration::ConvertOptions,
    convert::{ArchiveConverter, ArchiveReport},
    decoder::VideoDecoder,
    error::UnspoolError,
    layout::ARCHIVE_EXTENSION,
    progress::{OperationType, ProgressTracker},
};

/// Outcome of one conversion job.
#[derive(Debug)]
pub struct JobReport {
    /// The input archive.
    pub archive: PathBuf,
    /// The archive's report, or the error that failed the whole job.
    pub result: Result<ArchiveReport, UnspoolError>,
}

/// Aggregate outcome of a pipeline run.
#[derive(Debug, Default)]
pub struct PipelineSummary {
    /// Number of archives processed.
    pub total: usize,
    /// Archives whose job completed (members may still have failed).
    pub succeeded: usize,
    /// Archives whose job failed.
    pub failed: usize,
    /// Frames written across all archives.
    pub frames: u64,
    /// Members that failed across all completed archives.
    pub failed_entries: usize,
    /// Per-archive reports in completion order.
    pub reports: Vec<JobReport>,
}

impl PipelineSummary {
    fn record(&mut self, report: JobReport) {
        match &report.result {
            Ok(archive_report) => {
                self.succeeded += 1;
                self.frames += archive_report.frames();
                self.failed_entries += archive_report.failed_entries();
            }
            Err(_) => self.failed += 1,
        }
        self.reports.push(report);
    }
}

/// Expand `pattern` into a sorted, deduplicated list of tar archives.
///
/// Recursive `**` patterns are supported. Only regular files are kept.
/// Nothing is written to disk.
///
/// # Errors
///
/// - [`UnspoolError::InvalidPattern`] if the pattern does not end in `.tar`
///   or is not a valid glob.
/// - [`UnspoolError::NoInput`] if nothing matches.
pub fn resolve_inputs(pattern: &str) -> Result<Vec<PathBuf>, UnspoolError> {
    let invalid = |reason: String| UnspoolError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    if !pattern.ends_with(&format!(".{ARCHIVE_EXTENSION}")) {
        return Err(invalid(format!("pattern must end with '.{ARCHIVE_EXTENSION}'")));
    }

    let matches = glob::glob(pattern).map_err(|error| invalid(error.to_string()))?;
    let mut paths: Vec<PathBuf> = matches
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(error) => {
                log::warn!("Skipping unreadable path {}: {error}", error.path().display());
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    paths.dedup();

    if paths.is_empty() {
        return Err(UnspoolError::NoInput {
            pattern: pattern.to_string(),
        });
    }
    Ok(paths)
}

/// Runs conversion jobs over many archives.
#[derive(Debug, Clone)]
pub struct PipelineDriver {
    converter: ArchiveConverter,
}

impl PipelineDriver {
    /// Create a driver whose jobs use `options` and decode with `decoder`.
    pub fn new(options: ConvertOptions, decoder: Arc<dyn VideoDecoder>) -> Self {
        Self {
            converter: ArchiveConverter::new(options, decoder),
        }
    }

    /// Resolve `pattern` and convert every matching archive.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`resolve_inputs`] and
    /// [`ConvertOptions::validate`] before touching the filesystem, or an
    /// I/O error if the scratch root cannot be created. Per-archive failures
    /// are reported in the summary instead.
    pub fn run(&self, pattern: &str) -> Result<PipelineSummary, UnspoolError> {
        self.converter.options().validate()?;
        let archives = resolve_inputs(pattern)?;
        log::info!("Files to convert: {}", archives.len());
        self.run_paths(archives)
    }

    /// Convert an explicit list of archives.
    ///
    /// # Errors
    ///
    /// See [`run`](PipelineDriver::run).
    pub fn run_paths(&self, archives: Vec<PathBuf>) -> Result<PipelineSummary, UnspoolError> {
        let options = self.converter.options();
        options.validate()?;

        let mut summary = PipelineSummary {
            total: archives.len(),
            ..PipelineSummary::default()
        };
        if archives.is_empty() {
            return Ok(summary);
        }

        fs::create_dir_all(options.scratch_root())?;
        log::info!(
            "Starting conversion to {} with {} job(s)",
            options.mode(),
            options.jobs()
        );

        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::Pipeline,
            Some(archives.len() as u64),
        );
        let mut finish = |report: JobReport| {
            if let Err(error) = &report.result {
                log::error!("Failed to convert {}: {error}", report.archive.display());
            }
            tracker.advance(&report.archive.to_string_lossy(), report.result.is_err());
            summary.record(report);
        };

        if options.jobs() == 1 {
            log::debug!("Running sequentially; set more jobs to convert archives in parallel");
            for archive in archives {
                log::info!("Processing {}", archive.display());
                let result = self.converter.convert(&archive);
                finish(JobReport { archive, result });
            }
        } else {
            self.run_pool(archives, &mut finish)?;
        }

        log::info!(
            "Converted {}/{} archive(s), {} frame(s)",
            summary.succeeded,
            summary.total,
            summary.frames
        );
        Ok(summary)
    }

    fn run_pool<F>(&self, archives: Vec<PathBuf>, finish: &mut F) -> Result<(), UnspoolError>
    where
        F: FnMut(JobReport),
    {
        let jobs = self.converter.options().jobs();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|index| format!("unspool-worker-{index}"))
            .build()
            .map_err(|error| UnspoolError::InvalidOptions(error.to_string()))?;

        let converter = &self.converter;
        let (sender, receiver) = mpsc::channel::<JobReport>();

        pool.in_place_scope(|scope| {
            for archive in archives {
                let sender = sender.clone();
                scope.spawn(move |_| {
                    log::debug!("Worker picked up {}", archive.display());
                    let result = converter.convert(&archive);
                    // The receiver outlives every worker.
                    let _ = sender.send(JobReport { archive, result });
                });
            }
            drop(sender);

            for report in receiver {
                finish(report);
            }
        });

        Ok(())
    }
}

use std::{path::PathBuf, sync::Arc};

use clap::{ArgAction, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};
use unspool::{
    ConvertOptions, DEFAULT_VIDEO_EXTENSION, FfmpegDecoder, FfmpegLogLevel, OperationType,
    OutputMode, PipelineDriver, PipelineSummary, ProgressCallback, ProgressInfo,
};

const CLI_AFTER_HELP: &str = "Examples:\n  unspool 'data/**/*.tar'\n  unspool 'data/*.tar' --mode archive -j 8 --tmp-dir /scratch/unspool\n  unspool videos.tar --progress --json";

#[derive(Debug, Parser)]
#[command(
    name = "unspool",
    version,
    about = "Decompress tar archives of videos into image frames",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// File pattern matching tar archives (quote it to keep the shell from expanding it).
    files: String,

    /// Conversion mode: folder (frames next to the archive) or archive (alias: tar).
    #[arg(short, long, default_value = "folder")]
    mode: String,

    /// Number of archives converted in parallel.
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Scratch directory for staged videos and temporary frames.
    #[arg(long, alias = "tmp_dir")]
    tmp_dir: Option<PathBuf>,

    /// Extension of archive members treated as videos.
    #[arg(long, default_value = DEFAULT_VIDEO_EXTENSION)]
    video_ext: String,

    /// Allow overwriting existing `_decompressed.tar` outputs.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, default_value = "error")]
    ffmpeg_log_level: String,

    /// Show a progress bar.
    #[arg(long)]
    progress: bool,

    /// Print a machine-readable summary when done.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

struct TerminalProgress {
    bar: ProgressBar,
    show_entries: bool,
}

impl TerminalProgress {
    fn new(total: u64, show_entries: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} archives {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar, show_entries })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        match info.operation {
            OperationType::Pipeline => {
                self.bar.set_position(info.current);
                if info.failed {
                    if let Some(item) = &info.item {
                        self.bar
                            .println(format!("{} {item}", "failed:".red().bold()));
                    }
                }
            }
            OperationType::EntryConversion if self.show_entries => {
                if let (Some(item), Some(total)) = (&info.item, info.total) {
                    self.bar
                        .set_message(format!("[{}/{total}] {item}", info.current));
                }
            }
            _ => {}
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn summary_json(summary: &PipelineSummary) -> Value {
    let archives: Vec<Value> = summary
        .reports
        .iter()
        .map(|job| match &job.result {
            Ok(report) => json!({
                "archive": job.archive.display().to_string(),
                "output": report.output.display().to_string(),
                "frames": report.frames(),
                "entries": report.entries.iter().map(|entry| match &entry.result {
                    Ok(frames) => json!({ "member": entry.member, "frames": frames }),
                    Err(error) => json!({ "member": entry.member, "error": error.to_string() }),
                }).collect::<Vec<_>>(),
            }),
            Err(error) => json!({
                "archive": job.archive.display().to_string(),
                "error": error.to_string(),
            }),
        })
        .collect();

    json!({
        "total": summary.total,
        "succeeded": summary.succeeded,
        "failed": summary.failed,
        "frames": summary.frames,
        "failed_entries": summary.failed_entries,
        "archives": archives,
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let level = FfmpegLogLevel::parse(&cli.ffmpeg_log_level)
        .ok_or(format!("unsupported --ffmpeg-log-level: {}", cli.ffmpeg_log_level))?;
    unspool::set_ffmpeg_log_level(level);

    let mode: OutputMode = cli.mode.parse()?;
    let mut options = ConvertOptions::new()
        .with_mode(mode)
        .with_jobs(cli.jobs)
        .with_video_extension(&cli.video_ext)
        .with_overwrite(cli.overwrite);
    if let Some(tmp_dir) = &cli.tmp_dir {
        options = options.with_scratch_root(tmp_dir);
    }
    options.validate()?;

    let archives = unspool::resolve_inputs(&cli.files)?;

    let progress = if cli.progress {
        let progress = Arc::new(TerminalProgress::new(archives.len() as u64, cli.jobs == 1)?);
        options = options.with_progress(progress.clone());
        Some(progress)
    } else {
        None
    };

    log::info!("Files to convert: {}", archives.len());
    let driver = PipelineDriver::new(options, Arc::new(FfmpegDecoder::new()));
    let summary = driver.run_paths(archives)?;

    if let Some(progress) = progress {
        progress.bar.finish_with_message("done");
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&summary))?);
    } else if summary.failed == 0 && summary.failed_entries == 0 {
        println!(
            "{} {}",
            "success:".green().bold(),
            format!(
                "Converted {} archive(s), {} frame(s)",
                summary.succeeded, summary.frames
            )
            .green()
        );
    } else {
        println!(
            "{} {}",
            "warning:".yellow().bold(),
            format!(
                "Converted {}/{} archive(s), {} frame(s); {} archive(s) and {} video(s) failed, see log",
                summary.succeeded,
                summary.total,
                summary.frames,
                summary.failed,
                summary.failed_entries
            )
            .yellow()
        );
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::try_parse_from(["unspool", "data/*.tar"]).unwrap();
        assert_eq!(cli.files, "data/*.tar");
        assert_eq!(cli.mode, "folder");
        assert_eq!(cli.jobs, 1);
        assert_eq!(cli.video_ext, "mp4");
        assert!(cli.tmp_dir.is_none());
        assert!(!cli.overwrite);
    }

    #[test]
    fn short_flags_parse() {
        let cli = Cli::try_parse_from(["unspool", "x.tar", "-m", "tar", "-j", "4", "-vv"]).unwrap();
        assert_eq!(cli.mode, "tar");
        assert_eq!(cli.jobs, 4);
        assert_eq!(cli.verbose, 2);
    }
}

//! On-disk naming conventions.
//!
//! Every path the pipeline produces is derived here so folder mode, archive
//! mode and the staging area agree on one set of rules:
//!
//! | Item | Path |
//! |------|------|
//! | Folder output root | `<archive dir>/<archive stem>/` |
//! | Frame directory (folder mode) | `<root>/<member path without extension>/` |
//! | Output archive | `<archive dir>/<archive stem>_decompressed.tar` |
//! | Entry name (archive mode) | member base name up to its first `.` |
//! | Frame file | `00000000.jpg`, `00000001.jpg`, … |

use std::path::{Component, Path, PathBuf};

/// Suffix of the archives the pipeline reads and writes.
pub const ARCHIVE_EXTENSION: &str = "tar";

/// Suffix appended to an input archive's stem to name its archive-mode output.
pub const DECOMPRESSED_SUFFIX: &str = "_decompressed";

/// Extension of written frame images.
pub const FRAME_EXTENSION: &str = "jpg";

/// Number of decimal digits in a frame file name.
pub const FRAME_INDEX_WIDTH: usize = 8;

/// File name for the frame at `index`, e.g. `00000042.jpg`.
pub fn frame_file_name(index: u64) -> String {
    format!("{index:0width$}.{FRAME_EXTENSION}", width = FRAME_INDEX_WIDTH)
}

/// Returns `true` when `member` names a video with the given extension.
///
/// The comparison is case-sensitive and requires a non-empty base name, so
/// `clip.mp4` matches `mp4` while `.mp4` and `clip.MP4` do not.
pub fn is_video_member(member: &str, extension: &str) -> bool {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    match Path::new(member).file_name().and_then(|name| name.to_str()) {
        Some(name) => name.len() > suffix.len() && name.ends_with(&suffix),
        None => false,
    }
}

/// Stem of an archive path (`/data/videos.tar` → `videos`).
pub fn archive_stem(archive: &Path) -> String {
    archive
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directory that receives folder-mode output for `archive`.
pub fn folder_output_root(archive: &Path) -> PathBuf {
    sibling(archive, archive_stem(archive))
}

/// Path of the archive-mode output for `archive`.
pub fn decompressed_archive_path(archive: &Path) -> PathBuf {
    sibling(
        archive,
        format!(
            "{}{DECOMPRESSED_SUFFIX}.{ARCHIVE_EXTENSION}",
            archive_stem(archive)
        ),
    )
}

/// Relative frame directory for a member in folder mode.
///
/// Mirrors the member's path inside the archive with the video extension
/// removed. Leading `./`, `..` and root components are dropped so the result
/// always stays beneath the output root.
pub fn member_relative_dir(member: &str, extension: &str) -> PathBuf {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let trimmed = member.strip_suffix(&suffix).unwrap_or(member);
    Path::new(trimmed)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Entry name used when a member's base name is nothing but dots.
pub const FALLBACK_ARC_NAME: &str = "video";

/// Entry name for a member in archive mode: its base name up to the first `.`.
///
/// `clips/day1/clip.v2.mp4` becomes `clip`. A hidden file such as
/// `dir/.clip.mp4` keeps its leading dot and loses only its last extension
/// (`.clip`). The result is never empty.
pub fn member_arc_name(member: &str) -> String {
    let base = Path::new(member)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stem = base.split_once('.').map_or(base.as_str(), |(stem, _)| stem);
    if !stem.is_empty() {
        return stem.to_string();
    }

    match base.rsplit_once('.') {
        Some((hidden, _)) if hidden.chars().any(|c| c != '.') => hidden.to_string(),
        _ => FALLBACK_ARC_NAME.to_string(),
    }
}

/// Prefix for a member's staging directory.
///
/// Only used to make the scratch root readable while jobs are running;
/// uniqueness comes from the random suffix `tempfile` appends.
pub fn staging_prefix(archive: &Path, member: &str) -> String {
    let raw = format!("{}-{}-", archive_stem(archive), member_arc_name(member));
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn sibling(path: &Path, name: String) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

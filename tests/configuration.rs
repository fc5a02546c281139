//! ConvertOptions and OutputMode tests.

use std::path::Path;

use unspool::{ConvertOptions, OutputMode, UnspoolError};

// ── OutputMode ───────────────────────────────────────────────────

#[test]
fn mode_parses_names_and_aliases() {
    assert_eq!("folder".parse::<OutputMode>().unwrap(), OutputMode::Folder);
    assert_eq!("archive".parse::<OutputMode>().unwrap(), OutputMode::Archive);
    assert_eq!("tar".parse::<OutputMode>().unwrap(), OutputMode::Archive);
    assert_eq!("TAR".parse::<OutputMode>().unwrap(), OutputMode::Archive);
}

#[test]
fn unknown_mode_is_rejected() {
    let error = "zip".parse::<OutputMode>().unwrap_err();
    assert!(matches!(error, UnspoolError::InvalidOptions(_)));
    assert!(error.to_string().contains("zip"));
}

#[test]
fn mode_displays_canonical_name() {
    assert_eq!(OutputMode::Folder.to_string(), "folder");
    assert_eq!(OutputMode::Archive.to_string(), "archive");
    assert_eq!(OutputMode::default(), OutputMode::Folder);
}

// ── ConvertOptions builder ───────────────────────────────────────

#[test]
fn options_defaults() {
    let options = ConvertOptions::new();
    assert_eq!(options.mode(), OutputMode::Folder);
    assert_eq!(options.jobs(), 1);
    assert_eq!(options.video_extension(), "mp4");
    assert!(options.scratch_root().ends_with("unspool"));
    assert!(options.validate().is_ok());

    let debug = format!("{options:?}");
    assert!(debug.contains("ConvertOptions"));
    assert!(debug.contains("overwrite: false"));
}

#[test]
fn options_builder_sets_fields() {
    let options = ConvertOptions::new()
        .with_mode(OutputMode::Archive)
        .with_jobs(8)
        .with_scratch_root("/scratch/unspool")
        .with_video_extension(".mkv")
        .with_overwrite(true);

    assert_eq!(options.mode(), OutputMode::Archive);
    assert_eq!(options.jobs(), 8);
    assert_eq!(options.scratch_root(), Path::new("/scratch/unspool"));
    assert_eq!(options.video_extension(), "mkv");
    assert!(format!("{options:?}").contains("overwrite: true"));
}

#[test]
fn validation_rejects_unusable_values() {
    for options in [
        ConvertOptions::new().with_jobs(0),
        ConvertOptions::new().with_video_extension(""),
        ConvertOptions::new().with_scratch_root(""),
    ] {
        assert!(matches!(
            options.validate(),
            Err(UnspoolError::InvalidOptions(_))
        ));
    }
}

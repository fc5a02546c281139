//! Shared helpers for the integration tests.
//!
//! The conversion tests run without FFmpeg: [`ScriptedDecoder`] reads the
//! staged "video" as text holding a frame count and produces that many
//! small solid-colour images. A staged file whose content is not a number
//! fails to open, like a corrupt video would.

#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    fs::{self, File},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use image::{DynamicImage, Rgb, RgbImage};
use unspool::{FrameSource, ProgressCallback, ProgressInfo, UnspoolError, VideoDecoder};

pub const FRAME_SIZE: u32 = 8;

/// Decoder whose input files are plain-text frame counts.
#[derive(Debug, Default)]
pub struct ScriptedDecoder;

struct ScriptedFrames {
    next: u64,
    total: u64,
}

impl FrameSource for ScriptedFrames {
    fn next_frame(&mut self) -> Option<DynamicImage> {
        if self.next >= self.total {
            return None;
        }
        let shade = (self.next * 40 % 256) as u8;
        self.next += 1;
        Some(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            FRAME_SIZE,
            FRAME_SIZE,
            Rgb([shade, 255 - shade, 128]),
        )))
    }
}

impl VideoDecoder for ScriptedDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, UnspoolError> {
        let content = fs::read_to_string(path).map_err(|error| UnspoolError::DecoderOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
        let total = content
            .trim()
            .parse::<u64>()
            .map_err(|error| UnspoolError::DecoderOpen {
                path: path.to_path_buf(),
                reason: format!("not a video: {error}"),
            })?;
        Ok(Box::new(ScriptedFrames { next: 0, total }))
    }
}

pub fn scripted_decoder() -> Arc<dyn VideoDecoder> {
    Arc::new(ScriptedDecoder)
}

/// Write a tar archive holding `members` as regular files, in order.
pub fn build_tar(path: &Path, members: &[(&str, &str)]) {
    let file = File::create(path).expect("create archive");
    let mut builder = tar::Builder::new(file);
    for (name, content) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_bytes())
            .expect("append member");
    }
    builder.finish().expect("finish archive");
}

/// Regular-file entries of a tar archive mapped to their contents.
pub fn read_tar(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut archive = tar::Archive::new(File::open(path).expect("open archive"));
    let mut files = BTreeMap::new();
    for entry in archive.entries().expect("read entries") {
        let mut entry = entry.expect("read entry");
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path().expect("entry path").to_string_lossy().into_owned();
        let mut content = Vec::new();
        std::io::Read::read_to_end(&mut entry, &mut content).expect("read entry content");
        files.insert(name, content);
    }
    files
}

/// Sorted file names directly inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Every file under `root`, relative to it, with its contents.
pub fn snapshot_tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in fs::read_dir(dir).expect("read dir") {
            let path = entry.expect("dir entry").path();
            if path.is_dir() {
                walk(root, &path, files);
            } else {
                let relative = path.strip_prefix(root).expect("under root").to_path_buf();
                files.insert(relative, fs::read(&path).expect("read file"));
            }
        }
    }

    let mut files = BTreeMap::new();
    walk(root, root, &mut files);
    files
}

pub fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir).map(|mut entries| entries.next().is_none()).unwrap_or(true)
}

/// Progress callback that records every event.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.events.lock().unwrap().push(info.clone());
    }
}

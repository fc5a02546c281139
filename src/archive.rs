//! Tar archive access.
//!
//! [`ArchiveReader`] gives random access to the regular-file members of a
//! tar archive: the headers are walked once at open time to record where
//! each member's data starts, and [`extract`](ArchiveReader::extract) then
//! seeks straight to that offset. Nothing else in the archive is read or
//! unpacked.
//!
//! [`ArchiveWriter`] builds a new tar archive from files and directory
//! trees and writes the trailing end-of-archive blocks on
//! [`close`](ArchiveWriter::close).
//!
//! # Example
//!
//! ```no_run
//! use unspool::{ArchiveReader, ArchiveWriter};
//!
//! let mut reader = ArchiveReader::open("videos.tar")?;
//! for member in reader.list().to_vec() {
//!     let staged = reader.extract(&member, "/tmp/stage")?;
//!     println!("{member} -> {}", staged.display());
//! }
//! reader.close();
//!
//! let mut writer = ArchiveWriter::create("frames.tar", false)?;
//! writer.add_path("frames/clip1", "clip1")?;
//! writer.close()?;
//! # Ok::<(), unspool::UnspoolError>(())
//! ```

use std::{
    collections::HashMap,
    fmt::{Debug, Formatter, Result as FmtResult},
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Component, Path, PathBuf},
};

use tar::{Archive, Builder, HeaderMode};

use crate::error::UnspoolError;

/// Size of one tar header block; even an empty archive holds at least this much.
const TAR_BLOCK_SIZE: u64 = 512;

/// Location of one member's data inside the archive file.
#[derive(Debug, Clone, Copy)]
struct MemberSpan {
    offset: u64,
    size: u64,
}

/// Read access to a tar archive.
///
/// Created via [`ArchiveReader::open`]. The reader owns the archive's file
/// handle until [`close`](ArchiveReader::close) consumes it.
pub struct ArchiveReader {
    path: PathBuf,
    file: File,
    members: Vec<String>,
    index: HashMap<String, MemberSpan>,
}

impl Debug for ArchiveReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ArchiveReader")
            .field("path", &self.path)
            .field("members", &self.members.len())
            .finish_non_exhaustive()
    }
}

impl ArchiveReader {
    /// Open a tar archive and index its regular-file members.
    ///
    /// # Errors
    ///
    /// Returns [`UnspoolError::ArchiveOpen`] if the file is missing,
    /// unreadable, shorter than one tar block, or its headers are not valid
    /// tar headers.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, UnspoolError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening archive: {}", path.display());

        let open_error = |reason: String| UnspoolError::ArchiveOpen {
            path: path.clone(),
            reason,
        };

        let file = File::open(&path).map_err(|error| open_error(error.to_string()))?;
        let metadata = file
            .metadata()
            .map_err(|error| open_error(error.to_string()))?;
        if !metadata.is_file() {
            return Err(open_error("not a regular file".to_string()));
        }
        if metadata.len() < TAR_BLOCK_SIZE {
            return Err(open_error(format!(
                "{} byte(s) is too short for a tar header",
                metadata.len()
            )));
        }

        let mut archive = Archive::new(file);
        let mut members: Vec<String> = Vec::new();
        let mut index: HashMap<String, MemberSpan> = HashMap::new();

        let entries = archive
            .entries_with_seek()
            .map_err(|error| open_error(error.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|error| open_error(error.to_string()))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let name = entry
                .path()
                .map_err(|error| open_error(error.to_string()))?
                .to_string_lossy()
                .into_owned();
            let span = MemberSpan {
                offset: entry.raw_file_position(),
                size: entry.size(),
            };

            // Tar allows repeated names; the last copy wins.
            if index.insert(name.clone(), span).is_none() {
                members.push(name);
            }
        }

        let file = archive.into_inner();
        log::debug!("Indexed {} member(s) in {}", members.len(), path.display());

        Ok(Self {
            path,
            file,
            members,
            index,
        })
    }

    /// Path of the underlying archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Member names in archive order.
    pub fn list(&self) -> &[String] {
        &self.members
    }

    /// Returns `true` if the archive has a member called `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Size in bytes of the member called `name`.
    pub fn member_size(&self, name: &str) -> Option<u64> {
        self.index.get(name).map(|span| span.size)
    }

    /// Copy the member called `name` into `dest_dir`.
    ///
    /// The file is written as `dest_dir/<base name of member>` and its path
    /// returned. `dest_dir` must already exist.
    ///
    /// # Errors
    ///
    /// - [`UnspoolError::MemberNotFound`] if `name` is not in the archive.
    /// - [`UnspoolError::Extract`] if the member name is absolute or climbs
    ///   out with `..`, or if reading the archive or writing the destination
    ///   fails. A partially written destination is removed.
    pub fn extract<P: AsRef<Path>>(
        &mut self,
        name: &str,
        dest_dir: P,
    ) -> Result<PathBuf, UnspoolError> {
        let span = *self
            .index
            .get(name)
            .ok_or_else(|| UnspoolError::MemberNotFound {
                archive: self.path.clone(),
                member: name.to_string(),
            })?;

        let escapes = Path::new(name)
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(self.extract_error(
                name,
                "member path is absolute or contains '..'".to_string(),
            ));
        }

        let file_name = Path::new(name)
            .file_name()
            .ok_or_else(|| self.extract_error(name, "member has no file name".to_string()))?;
        let destination = dest_dir.as_ref().join(file_name);

        log::debug!(
            "Extracting {name} ({} bytes) to {}",
            span.size,
            destination.display()
        );

        if let Err(error) = self.copy_span(span, &destination) {
            let _ = fs::remove_file(&destination);
            return Err(self.extract_error(name, error.to_string()));
        }

        Ok(destination)
    }

    /// Release the archive's file handle.
    pub fn close(self) {
        log::debug!("Closing archive: {}", self.path.display());
    }

    fn copy_span(&mut self, span: MemberSpan, destination: &Path) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(span.offset))?;
        let mut output = BufWriter::new(File::create(destination)?);
        let copied = io::copy(&mut (&mut self.file).take(span.size), &mut output)?;
        if copied != span.size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("archive truncated: expected {} bytes, read {copied}", span.size),
            ));
        }
        output.flush()
    }

    fn extract_error(&self, name: &str, reason: String) -> UnspoolError {
        UnspoolError::Extract {
            archive: self.path.clone(),
            member: name.to_string(),
            reason,
        }
    }
}

/// Write access to a new tar archive.
///
/// Created via [`ArchiveWriter::create`]. Call [`close`](ArchiveWriter::close)
/// to finalise the archive; [`abandon`](ArchiveWriter::abandon) discards it.
pub struct ArchiveWriter {
    path: PathBuf,
    builder: Builder<BufWriter<File>>,
}

impl Debug for ArchiveWriter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ArchiveWriter")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ArchiveWriter {
    /// Create a new archive at `path`.
    ///
    /// An existing file is only replaced when `overwrite` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`UnspoolError::ArchiveCreate`] if the file cannot be opened
    /// for writing or already exists and `overwrite` is `false`.
    pub fn create<P: AsRef<Path>>(path: P, overwrite: bool) -> Result<Self, UnspoolError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Creating archive: {}", path.display());

        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let file = options
            .open(&path)
            .map_err(|error| UnspoolError::ArchiveCreate {
                path: path.clone(),
                reason: if error.kind() == io::ErrorKind::AlreadyExists {
                    "file already exists (overwrite not allowed)".to_string()
                } else {
                    error.to_string()
                },
            })?;

        let mut builder = Builder::new(BufWriter::new(file));
        builder.mode(HeaderMode::Deterministic);
        builder.follow_symlinks(false);

        Ok(Self { path, builder })
    }

    /// Path of the archive being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `source` to the archive under `arc_name`.
    ///
    /// A directory is added recursively: a directory entry for `arc_name`
    /// followed by its contents under `arc_name/`, in sorted order. A file
    /// is added as a single entry called `arc_name`.
    ///
    /// # Errors
    ///
    /// Returns [`UnspoolError::ArchiveWrite`] on any I/O failure. Entries
    /// appended before the failure are left intact.
    pub fn add_path<P: AsRef<Path>>(
        &mut self,
        source: P,
        arc_name: &str,
    ) -> Result<(), UnspoolError> {
        let source = source.as_ref();
        log::debug!(
            "Adding {} to {} as {arc_name}",
            source.display(),
            self.path.display()
        );

        let result = if source.is_dir() {
            self.append_tree(source, Path::new(arc_name))
        } else {
            self.builder.append_path_with_name(source, arc_name)
        };

        result.map_err(|error| self.write_error(error))
    }

    /// Write the end-of-archive marker and flush everything to disk.
    ///
    /// # Errors
    ///
    /// Returns [`UnspoolError::ArchiveWrite`] if finalising or flushing fails.
    pub fn close(self) -> Result<PathBuf, UnspoolError> {
        let Self { path, builder } = self;
        let finish = builder.into_inner().and_then(|mut writer| {
            writer.flush()?;
            writer.get_ref().sync_all()
        });
        match finish {
            Ok(()) => {
                log::debug!("Closed archive: {}", path.display());
                Ok(path)
            }
            Err(error) => Err(UnspoolError::ArchiveWrite {
                reason: error.to_string(),
                path,
            }),
        }
    }

    /// Drop the archive and delete the partially written file.
    pub fn abandon(self) {
        let Self { path, builder } = self;
        drop(builder);
        match fs::remove_file(&path) {
            Ok(()) => log::debug!("Removed incomplete archive: {}", path.display()),
            Err(error) => log::warn!(
                "Failed to remove incomplete archive {}: {error}",
                path.display()
            ),
        }
    }

    fn append_tree(&mut self, directory: &Path, arc_path: &Path) -> io::Result<()> {
        self.builder.append_dir(arc_path, directory)?;

        let mut children: Vec<PathBuf> = fs::read_dir(directory)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<io::Result<_>>()?;
        children.sort();

        for child in children {
            let Some(name) = child.file_name() else {
                continue;
            };
            let child_arc_path = arc_path.join(name);
            if child.is_dir() {
                self.append_tree(&child, &child_arc_path)?;
            } else {
                self.builder.append_path_with_name(&child, &child_arc_path)?;
            }
        }
        Ok(())
    }

    fn write_error(&self, error: io::Error) -> UnspoolError {
        UnspoolError::ArchiveWrite {
            path: self.path.clone(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_archive(path: &Path, members: &[(&str, &str)]) {
        let mut builder = Builder::new(File::create(path).unwrap());
        for (name, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, data.as_bytes()).unwrap();
        }
        builder.finish().unwrap();
    }

    #[test]
    fn rejects_members_outside_the_archive_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evil.tar");
        let mut builder = Builder::new(File::create(&path).unwrap());
        let mut header = tar::Header::new_old();
        let name = b"../evil.mp4";
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_size(1);
        header.set_cksum();
        builder.append(&header, &b"1"[..]).unwrap();
        builder.finish().unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        assert_eq!(reader.list(), ["../evil.mp4"]);
        let stage = dir.path().join("stage");
        fs::create_dir_all(&stage).unwrap();
        assert!(matches!(
            reader.extract("../evil.mp4", &stage),
            Err(UnspoolError::Extract { .. })
        ));
        assert!(!dir.path().join("evil.mp4").exists());
    }

    #[test]
    fn lists_members_in_archive_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tar");
        build_archive(&path, &[("b.mp4", "bb"), ("a.txt", "a"), ("c/d.mp4", "ddd")]);

        let reader = ArchiveReader::open(&path).unwrap();
        assert_eq!(reader.list(), ["b.mp4", "a.txt", "c/d.mp4"]);
        assert_eq!(reader.member_size("c/d.mp4"), Some(3));
        assert!(!reader.contains("missing.mp4"));
    }

    #[test]
    fn extracts_members_out_of_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tar");
        build_archive(&path, &[("one.mp4", "first"), ("sub/two.mp4", "second")]);

        let mut reader = ArchiveReader::open(&path).unwrap();
        let stage = dir.path().join("stage");
        fs::create_dir(&stage).unwrap();

        let second = reader.extract("sub/two.mp4", &stage).unwrap();
        let first = reader.extract("one.mp4", &stage).unwrap();
        assert_eq!(second, stage.join("two.mp4"));
        assert_eq!(fs::read(second).unwrap(), b"second");
        assert_eq!(fs::read(first).unwrap(), b"first");
    }

    #[test]
    fn repeated_names_keep_last_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tar");
        build_archive(&path, &[("x.mp4", "old"), ("y.mp4", "y"), ("x.mp4", "new")]);

        let mut reader = ArchiveReader::open(&path).unwrap();
        assert_eq!(reader.list(), ["x.mp4", "y.mp4"]);
        let staged = reader.extract("x.mp4", dir.path()).unwrap();
        assert_eq!(fs::read(staged).unwrap(), b"new");
    }

    #[test]
    fn missing_member_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tar");
        build_archive(&path, &[("x.mp4", "x")]);

        let mut reader = ArchiveReader::open(&path).unwrap();
        match reader.extract("nope.mp4", dir.path()) {
            Err(UnspoolError::MemberNotFound { member, .. }) => assert_eq!(member, "nope.mp4"),
            other => panic!("Expected MemberNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn writer_refuses_existing_file_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tar");
        fs::write(&path, b"keep me").unwrap();

        let result = ArchiveWriter::create(&path, false);
        assert!(matches!(result, Err(UnspoolError::ArchiveCreate { .. })));
        assert_eq!(fs::read(&path).unwrap(), b"keep me");

        let writer = ArchiveWriter::create(&path, true).unwrap();
        writer.close().unwrap();
        assert!(ArchiveReader::open(&path).unwrap().list().is_empty());
    }

    #[test]
    fn abandon_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tar");
        let writer = ArchiveWriter::create(&path, false).unwrap();
        writer.abandon();
        assert!(!path.exists());
    }
}

use crate::exif_reader::{is_photo, read_capture_date};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

/// Snapshot of one filesystem node taken while building a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub name: String,
    pub kind: EntryKind,
    /// Distance from the batch root; direct children are depth 1.
    pub depth: usize,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Local>>,
    /// EXIF capture time, only read for rules that need it.
    pub captured_at: Option<DateTime<Local>>,
}

impl FileEntry {
    pub fn snapshot(path: &Path, depth: usize, read_capture: bool) -> io::Result<Self> {
        let meta = fs::symlink_metadata(path)?;
        let name = path
            .file_name()
            .and_then(|v| v.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("name is not valid UTF-8: {}", path.display()),
                )
            })?;
        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let modified = meta.modified().ok().map(DateTime::<Local>::from);

        let captured_at = if read_capture && kind == EntryKind::File && is_photo(path) {
            match read_capture_date(path) {
                Ok(date) => date,
                Err(err) => {
                    log::debug!("no EXIF date, using modified time: {err:#}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            path: path.to_path_buf(),
            name,
            kind,
            depth,
            size: (kind == EntryKind::File).then_some(meta.len()),
            modified,
            captured_at,
        })
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif_reader::testing::write_dated_tiff;
    use tempfile::tempdir;

    #[test]
    fn snapshot_records_kind_and_size() {
        let temp = tempdir().expect("tempdir");
        let file = temp.path().join("a.txt");
        fs::write(&file, b"hello").expect("write");
        let dir = temp.path().join("sub");
        fs::create_dir(&dir).expect("mkdir");

        let entry = FileEntry::snapshot(&file, 1, false).expect("snapshot file");
        assert_eq!(entry.name, "a.txt");
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.size, Some(5));
        assert!(entry.modified.is_some());

        let entry = FileEntry::snapshot(&dir, 1, false).expect("snapshot dir");
        assert!(entry.is_dir());
        assert_eq!(entry.size, None);
    }

    #[test]
    fn capture_date_falls_back_quietly() {
        let temp = tempdir().expect("tempdir");
        let file = temp.path().join("broken.jpg");
        fs::write(&file, b"no exif here").expect("write");

        let entry = FileEntry::snapshot(&file, 1, true).expect("snapshot");
        assert_eq!(entry.captured_at, None);
        assert!(entry.modified.is_some());
    }

    #[test]
    fn photo_snapshot_carries_the_exif_capture_date() {
        use chrono::Datelike;
        use exif::Tag;

        let temp = tempdir().expect("tempdir");
        let file = temp.path().join("shot.tiff");
        write_dated_tiff(&file, &[(Tag::DateTimeOriginal, "2019:11:12 13:14:15")]);

        let entry = FileEntry::snapshot(&file, 1, true).expect("snapshot");
        let captured = entry.captured_at.expect("capture date");
        assert_eq!((captured.year(), captured.month()), (2019, 11));

        let without = FileEntry::snapshot(&file, 1, false).expect("snapshot");
        assert_eq!(without.captured_at, None);
    }

    #[test]
    fn missing_path_is_an_io_error() {
        let temp = tempdir().expect("tempdir");
        let err = FileEntry::snapshot(&temp.path().join("nope"), 1, false).expect_err("must fail");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

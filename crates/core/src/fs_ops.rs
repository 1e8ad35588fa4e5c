use std::fs;
use std::io;
use std::path::Path;

/// The only filesystem mutations the engine performs. Content is never copied or
/// deleted, so a bug here can at worst leave a node under the wrong name.
pub trait RenameFs: Send + Sync {
    /// True if anything (file, folder, dangling link) sits at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// True if both paths name the same node, e.g. a case-only rename on a
    /// case-insensitive volume.
    fn same_node(&self, a: &Path, b: &Path) -> bool;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl RenameFs for StdFs {
    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    #[cfg(unix)]
    fn same_node(&self, a: &Path, b: &Path) -> bool {
        use std::os::unix::fs::MetadataExt;
        match (fs::symlink_metadata(a), fs::symlink_metadata(b)) {
            (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
            _ => false,
        }
    }

    #[cfg(not(unix))]
    fn same_node(&self, a: &Path, b: &Path) -> bool {
        let same_parent = a.parent() == b.parent();
        let same_name = match (a.file_name(), b.file_name()) {
            (Some(x), Some(y)) => {
                x.to_string_lossy().to_lowercase() == y.to_string_lossy().to_lowercase()
            }
            _ => false,
        };
        same_parent && same_name && self.exists(a)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

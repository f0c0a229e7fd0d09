//! The disk primitives the renamer needs, behind a trait so planning and
//! execution can be exercised against something other than the real disk.

use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Minimal filesystem interface: existence checks, moves, directory trees.
pub trait FileSystem: Sync {
    fn exists(&self, path: &Path) -> bool;

    /// Moves a file. Must not silently replace an existing destination on
    /// platforms where that can be avoided; callers check beforehand.
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Creates `dir` and any missing parents. Succeeds if it already exists.
    fn mkdir_all(&self, dir: &Path) -> io::Result<()>;
}

/// [`FileSystem`] over `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        match fs::rename(from, to) {
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                debug!(from = %from.display(), to = %to.display(), "rename crosses devices, copying");
                fs::copy(from, to)?;
                fs::remove_file(from)
            }
            other => other,
        }
    }

    fn mkdir_all(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }
}

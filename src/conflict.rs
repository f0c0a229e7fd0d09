//! Destination conflict detection.
//!
//! Runs over the complete plan before anything is executed, so that no two
//! operations can end up writing the same path and nothing on disk is ever
//! overwritten.

use crate::filesystem::FileSystem;
use crate::planner::{OperationStatus, PlannedOperation};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// How paths are compared on the target filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathComparison {
    CaseSensitive,
    CaseInsensitive,
}

impl PathComparison {
    /// The usual behavior of the platform's default filesystem.
    pub fn native() -> Self {
        if cfg!(any(windows, target_os = "macos")) {
            PathComparison::CaseInsensitive
        } else {
            PathComparison::CaseSensitive
        }
    }

    /// Key under which `path` is compared.
    pub fn key(self, path: &Path) -> String {
        let text = path.to_string_lossy();
        match self {
            PathComparison::CaseSensitive => text.into_owned(),
            PathComparison::CaseInsensitive => text.to_lowercase(),
        }
    }

    pub fn same(self, a: &Path, b: &Path) -> bool {
        self.key(a) == self.key(b)
    }
}

impl Default for PathComparison {
    fn default() -> Self {
        Self::native()
    }
}

/// Marks colliding operations as duplicates and returns how many were marked.
///
/// Pending operations are grouped by destination; the first of each group, in
/// input order, keeps its status and every later one becomes a duplicate. A
/// pending operation whose destination already exists on disk (and is not its
/// own source) is a duplicate as well. Operations that are already terminal
/// are skipped.
pub fn resolve<F: FileSystem + ?Sized>(
    operations: &mut [PlannedOperation],
    fs: &F,
    comparison: PathComparison,
) -> usize {
    let mut claimed: HashMap<String, String> = HashMap::new();
    let mut marked = 0;

    for operation in operations.iter_mut() {
        if operation.status != OperationStatus::Pending {
            continue;
        }

        let key = comparison.key(&operation.new_path);
        if let Some(owner) = claimed.get(&key) {
            let message = format!("destination collides with scene {owner}");
            warn!(scene_id = %operation.scene_id, path = %operation.new_path.display(), "{message}");
            operation.mark_duplicate(message);
            marked += 1;
            continue;
        }
        claimed.insert(key, operation.scene_id.clone());

        if !comparison.same(&operation.new_path, &operation.old_path)
            && fs.exists(&operation.new_path)
        {
            warn!(
                scene_id = %operation.scene_id,
                path = %operation.new_path.display(),
                "destination already exists on disk"
            );
            operation.mark_duplicate("destination already exists on disk");
            marked += 1;
        }
    }

    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;
    use std::path::PathBuf;

    struct FakeDisk {
        files: HashSet<PathBuf>,
    }

    impl FakeDisk {
        fn with(paths: &[&str]) -> Self {
            Self {
                files: paths.iter().map(PathBuf::from).collect(),
            }
        }
    }

    impl FileSystem for FakeDisk {
        fn exists(&self, path: &Path) -> bool {
            self.files.contains(path)
        }
        fn move_file(&self, _from: &Path, _to: &Path) -> io::Result<()> {
            unreachable!("resolution never moves files")
        }
        fn mkdir_all(&self, _dir: &Path) -> io::Result<()> {
            unreachable!("resolution never creates directories")
        }
    }

    fn op(id: &str, old: &str, new: &str) -> PlannedOperation {
        PlannedOperation {
            scene_id: id.to_string(),
            title: String::new(),
            old_path: PathBuf::from(old),
            old_filename: String::new(),
            new_path: PathBuf::from(new),
            new_filename: String::new(),
            status: OperationStatus::Pending,
            error: None,
        }
    }

    #[test]
    fn test_second_claim_on_destination_is_duplicate() {
        let mut ops = vec![
            op("1", "/m/a.mp4", "/m/Acme - Scene.mp4"),
            op("2", "/m/b.mp4", "/m/Acme - Scene.mp4"),
        ];
        let marked = resolve(&mut ops, &FakeDisk::with(&[]), PathComparison::CaseSensitive);

        assert_eq!(marked, 1);
        assert_eq!(ops[0].status, OperationStatus::Pending);
        assert_eq!(ops[1].status, OperationStatus::Duplicate);
        assert_eq!(
            ops[1].error.as_deref(),
            Some("destination collides with scene 1")
        );
    }

    #[test]
    fn test_existing_destination_is_duplicate() {
        let mut ops = vec![op("1", "/m/a.mp4", "/m/taken.mp4")];
        resolve(&mut ops, &FakeDisk::with(&["/m/taken.mp4"]), PathComparison::CaseSensitive);
        assert_eq!(ops[0].status, OperationStatus::Duplicate);
    }

    #[test]
    fn test_unchanged_path_is_not_a_conflict() {
        let mut ops = vec![op("1", "/m/a.mp4", "/m/a.mp4")];
        let marked = resolve(&mut ops, &FakeDisk::with(&["/m/a.mp4"]), PathComparison::CaseSensitive);
        assert_eq!(marked, 0);
        assert_eq!(ops[0].status, OperationStatus::Pending);
    }

    #[test]
    fn test_case_insensitive_comparison() {
        let mut ops = vec![
            op("1", "/m/a.mp4", "/m/Scene.mp4"),
            op("2", "/m/b.mp4", "/m/scene.mp4"),
        ];
        resolve(&mut ops, &FakeDisk::with(&[]), PathComparison::CaseSensitive);
        assert_eq!(ops[1].status, OperationStatus::Pending);

        let mut ops = vec![
            op("1", "/m/a.mp4", "/m/Scene.mp4"),
            op("2", "/m/b.mp4", "/m/scene.mp4"),
        ];
        resolve(&mut ops, &FakeDisk::with(&[]), PathComparison::CaseInsensitive);
        assert_eq!(ops[1].status, OperationStatus::Duplicate);
    }

    #[test]
    fn test_case_only_rename_is_allowed_when_insensitive() {
        let mut ops = vec![op("1", "/m/scene.mp4", "/m/Scene.mp4")];
        let disk = FakeDisk::with(&["/m/Scene.mp4", "/m/scene.mp4"]);
        resolve(&mut ops, &disk, PathComparison::CaseInsensitive);
        assert_eq!(ops[0].status, OperationStatus::Pending);
    }

    #[test]
    fn test_terminal_operations_are_ignored() {
        let mut failed = op("1", "", "/m/x.mp4");
        failed.status = OperationStatus::Error;
        let mut ops = vec![failed, op("2", "/m/b.mp4", "/m/x.mp4")];

        resolve(&mut ops, &FakeDisk::with(&[]), PathComparison::CaseSensitive);
        assert_eq!(ops[0].status, OperationStatus::Error);
        assert_eq!(ops[1].status, OperationStatus::Pending);
    }
}

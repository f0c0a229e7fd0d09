/// Plan execution.
///
/// Applies resolved [`PlannedOperation`]s to disk, or previews them under a dry
/// run, and records every outcome in a [`Ledger`]. A failed move never aborts
/// the batch: the operation is marked `error` and the rest keep going.
///
/// Operations are grouped by destination directory. Groups are independent and
/// may run on a bounded rayon pool; operations inside a group always run in
/// plan order, one after another.
use crate::conflict::PathComparison;
use crate::filesystem::FileSystem;
use crate::ledger::Ledger;
use crate::name_set::NameSet;
use crate::planner::{OperationStatus, PlannedOperation};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Whether and which operations are applied to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    DryRun,
    CommitAll,
    /// Commit only operations whose scene id is in the set.
    CommitSelected(NameSet),
}

impl ExecutionMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, ExecutionMode::DryRun)
    }

    /// Whether the operation for `scene_id` is applied under this mode.
    pub fn includes(&self, scene_id: &str) -> bool {
        match self {
            ExecutionMode::DryRun => false,
            ExecutionMode::CommitAll => true,
            ExecutionMode::CommitSelected(ids) => ids.contains(scene_id),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExecutionMode::DryRun => "dry-run",
            ExecutionMode::CommitAll => "commit-all",
            ExecutionMode::CommitSelected(_) => "commit-selected",
        }
    }
}

/// Filesystem failures while applying one operation.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("source file does not exist: {}", path.display())]
    SourceMissing { path: PathBuf },
    #[error("destination already exists: {}", path.display())]
    DestinationExists { path: PathBuf },
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

type ProgressFn<'a> = dyn Fn(&PlannedOperation, OperationStatus) + Send + Sync + 'a;

/// Applies plans against a [`FileSystem`].
///
/// # Examples
///
/// ```no_run
/// use scene_renamer::executor::{ExecutionMode, Executor};
/// use scene_renamer::filesystem::StdFileSystem;
///
/// let fs = StdFileSystem;
/// let ledger = Executor::new(&fs).jobs(4).execute(Vec::new(), &ExecutionMode::CommitAll);
/// assert!(ledger.is_empty());
/// ```
pub struct Executor<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    jobs: usize,
    comparison: PathComparison,
    progress: Option<Box<ProgressFn<'a>>>,
}

impl<'a, F: FileSystem + ?Sized> Executor<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self {
            fs,
            jobs: 1,
            comparison: PathComparison::native(),
            progress: None,
        }
    }

    /// Maximum number of destination directories worked on at once.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn comparison(mut self, comparison: PathComparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// Called once per attempted operation with its outcome. May be called
    /// from worker threads.
    pub fn on_progress(
        mut self,
        callback: impl Fn(&PlannedOperation, OperationStatus) + Send + Sync + 'a,
    ) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Number of operations `execute` would attempt under `mode`.
    pub fn attempt_count(operations: &[PlannedOperation], mode: &ExecutionMode) -> usize {
        operations
            .iter()
            .filter(|op| op.status == OperationStatus::Pending && mode.includes(&op.scene_id))
            .count()
    }

    pub fn execute(&self, mut operations: Vec<PlannedOperation>, mode: &ExecutionMode) -> Ledger {
        let mut ledger = Ledger::new(mode.clone());

        if mode.is_dry_run() {
            for op in operations.iter().filter(|op| op.status == OperationStatus::Pending) {
                debug!(
                    scene_id = %op.scene_id,
                    from = %op.old_path.display(),
                    to = %op.new_path.display(),
                    "dry run, not moving"
                );
            }
            ledger.extend(operations);
            ledger.finish();
            return ledger;
        }

        let groups = self.group_by_directory(&operations, mode);
        let outcomes = self.run_groups(&operations, &groups);

        for (index, outcome) in outcomes {
            let op = &mut operations[index];
            match outcome {
                Ok(()) => {
                    info!(scene_id = %op.scene_id, to = %op.new_path.display(), "renamed");
                    op.mark_success();
                }
                Err(e) => {
                    warn!(scene_id = %op.scene_id, error = %e, "rename failed");
                    op.mark_error(e.to_string());
                }
            }
        }

        ledger.extend(operations);
        ledger.finish();
        ledger
    }

    /// Indices of in-scope pending operations, grouped by destination
    /// directory. Groups appear in order of their first operation.
    fn group_by_directory(
        &self,
        operations: &[PlannedOperation],
        mode: &ExecutionMode,
    ) -> Vec<Vec<usize>> {
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();

        for (index, op) in operations.iter().enumerate() {
            if op.status != OperationStatus::Pending || !mode.includes(&op.scene_id) {
                continue;
            }
            let key = op
                .new_dir()
                .map(|dir| self.comparison.key(dir))
                .unwrap_or_default();
            let slot = *slots.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(index);
        }
        groups
    }

    fn run_groups(
        &self,
        operations: &[PlannedOperation],
        groups: &[Vec<usize>],
    ) -> Vec<(usize, Result<(), ExecutionError>)> {
        let run_group = |group: &Vec<usize>| -> Vec<(usize, Result<(), ExecutionError>)> {
            group
                .iter()
                .map(|&index| (index, self.attempt(&operations[index])))
                .collect()
        };

        if self.jobs > 1 && groups.len() > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
                Ok(pool) => {
                    return pool.install(|| groups.par_iter().flat_map(run_group).collect());
                }
                Err(e) => warn!(error = %e, "could not start worker pool, running sequentially"),
            }
        }
        groups.iter().flat_map(run_group).collect()
    }

    fn attempt(&self, op: &PlannedOperation) -> Result<(), ExecutionError> {
        let result = self.apply(op);
        if let Some(progress) = &self.progress {
            let status = if result.is_ok() {
                OperationStatus::Success
            } else {
                OperationStatus::Error
            };
            progress(op, status);
        }
        result
    }

    /// Moves one file into place, creating its directory first.
    fn apply(&self, op: &PlannedOperation) -> Result<(), ExecutionError> {
        if !op.is_rename() {
            return Ok(());
        }

        if !self.fs.exists(&op.old_path) {
            return Err(ExecutionError::SourceMissing {
                path: op.old_path.clone(),
            });
        }

        // The disk may have changed since conflicts were resolved.
        if !self.comparison.same(&op.old_path, &op.new_path) && self.fs.exists(&op.new_path) {
            return Err(ExecutionError::DestinationExists {
                path: op.new_path.clone(),
            });
        }

        if let Some(dir) = op.new_dir()
            && !dir.as_os_str().is_empty()
        {
            self.fs
                .mkdir_all(dir)
                .map_err(|source| ExecutionError::DirectoryCreationFailed {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        self.fs
            .move_file(&op.old_path, &op.new_path)
            .map_err(|source| ExecutionError::MoveFailed {
                from: op.old_path.clone(),
                to: op.new_path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::StdFileSystem;
    use std::fs;
    use std::io;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn op(id: &str, old: &Path, new: &Path) -> PlannedOperation {
        PlannedOperation {
            scene_id: id.to_string(),
            title: String::new(),
            old_path: old.to_path_buf(),
            old_filename: old
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            new_path: new.to_path_buf(),
            new_filename: new
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            status: OperationStatus::Pending,
            error: None,
        }
    }

    /// Records every call and refuses to create directories named `locked`.
    #[derive(Default)]
    struct RecordingFs {
        files: Mutex<Vec<PathBuf>>,
        calls: AtomicUsize,
    }

    impl RecordingFs {
        fn with(paths: &[&str]) -> Self {
            Self {
                files: Mutex::new(paths.iter().map(PathBuf::from).collect()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FileSystem for RecordingFs {
        fn exists(&self, path: &Path) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.files.lock().expect("lock").iter().any(|p| p == path)
        }

        fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut files = self.files.lock().expect("lock");
            files.retain(|p| p != from);
            files.push(to.to_path_buf());
            Ok(())
        }

        fn mkdir_all(&self, dir: &Path) -> io::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if dir.ends_with("locked") {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let fs = RecordingFs::with(&["/m/a.mp4"]);
        let ops = vec![op("1", Path::new("/m/a.mp4"), Path::new("/m/A.mp4"))];

        let ledger = Executor::new(&fs).execute(ops, &ExecutionMode::DryRun);

        assert_eq!(fs.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.operations()[0].status, OperationStatus::Pending);
        assert!(ledger.finished_at().is_some());
    }

    #[test]
    fn test_commit_selected_leaves_others_pending() {
        let fs = RecordingFs::with(&["/m/5.mp4", "/m/6.mp4"]);
        let ops = vec![
            op("5", Path::new("/m/5.mp4"), Path::new("/m/Five.mp4")),
            op("6", Path::new("/m/6.mp4"), Path::new("/m/Six.mp4")),
        ];
        let mode = ExecutionMode::CommitSelected(NameSet::from_csv("5"));

        let ledger = Executor::new(&fs).execute(ops, &mode);

        assert_eq!(ledger.operations()[0].status, OperationStatus::Success);
        assert_eq!(ledger.operations()[1].status, OperationStatus::Pending);
    }

    #[test]
    fn test_failures_do_not_abort_batch() {
        let fs = RecordingFs::with(&["/m/a.mp4", "/m/b.mp4", "/m/c.mp4"]);
        let ops = vec![
            op("1", Path::new("/m/a.mp4"), Path::new("/m/locked/A.mp4")),
            op("2", Path::new("/m/missing.mp4"), Path::new("/m/B.mp4")),
            op("3", Path::new("/m/c.mp4"), Path::new("/m/C.mp4")),
        ];

        let ledger = Executor::new(&fs).execute(ops, &ExecutionMode::CommitAll);
        let ops = ledger.operations();

        assert_eq!(ops[0].status, OperationStatus::Error);
        assert!(ops[0].error.as_deref().unwrap_or_default().contains("failed to create directory"));
        assert_eq!(ops[1].status, OperationStatus::Error);
        assert!(ops[1].error.as_deref().unwrap_or_default().contains("does not exist"));
        assert_eq!(ops[2].status, OperationStatus::Success);
    }

    #[test]
    fn test_terminal_operations_are_not_attempted() {
        let fs = RecordingFs::with(&["/m/a.mp4"]);
        let mut duplicate = op("1", Path::new("/m/a.mp4"), Path::new("/m/A.mp4"));
        duplicate.mark_duplicate("destination collides with scene 0");

        let ledger = Executor::new(&fs).execute(vec![duplicate], &ExecutionMode::CommitAll);

        assert_eq!(fs.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.operations()[0].status, OperationStatus::Duplicate);
    }

    #[test]
    fn test_unchanged_path_succeeds_without_disk_access() {
        let fs = RecordingFs::default();
        let ops = vec![op("1", Path::new("/m/a.mp4"), Path::new("/m/a.mp4"))];

        let ledger = Executor::new(&fs).execute(ops, &ExecutionMode::CommitAll);

        assert_eq!(fs.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.operations()[0].status, OperationStatus::Success);
    }

    #[test]
    fn test_never_overwrites_late_arrival() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let old = temp_dir.path().join("a.mp4");
        let new = temp_dir.path().join("A - Scene.mp4");
        fs::write(&old, "source").expect("Failed to write source");
        fs::write(&new, "someone else").expect("Failed to write destination");

        let ledger = Executor::new(&StdFileSystem)
            .comparison(PathComparison::CaseSensitive)
            .execute(vec![op("1", &old, &new)], &ExecutionMode::CommitAll);

        assert_eq!(ledger.operations()[0].status, OperationStatus::Error);
        assert_eq!(fs::read_to_string(&new).expect("read"), "someone else");
        assert!(old.exists());
    }

    #[test]
    fn test_commit_creates_directories_and_moves() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let old = temp_dir.path().join("raw.mp4");
        let new = temp_dir.path().join("Acme").join("2024").join("Intro.mp4");
        fs::write(&old, "video").expect("Failed to write source");

        let ledger = Executor::new(&StdFileSystem).execute(vec![op("1", &old, &new)], &ExecutionMode::CommitAll);

        assert_eq!(ledger.operations()[0].status, OperationStatus::Success);
        assert!(!old.exists());
        assert_eq!(fs::read_to_string(&new).expect("read"), "video");
    }

    #[test]
    fn test_parallel_jobs_keep_plan_order_and_report_progress() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut ops = Vec::new();
        for i in 0..12 {
            let old = temp_dir.path().join(format!("{i}.mp4"));
            fs::write(&old, "x").expect("Failed to write source");
            let new = temp_dir
                .path()
                .join(format!("dir{}", i % 4))
                .join(format!("Scene {i}.mp4"));
            ops.push(op(&i.to_string(), &old, &new));
        }

        let seen = AtomicUsize::new(0);
        let ledger = Executor::new(&StdFileSystem)
            .jobs(4)
            .on_progress(|_, status| {
                assert_eq!(status, OperationStatus::Success);
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .execute(ops, &ExecutionMode::CommitAll);

        assert_eq!(seen.load(Ordering::SeqCst), 12);
        let ids: Vec<_> = ledger.operations().iter().map(|op| op.scene_id.clone()).collect();
        let expected: Vec<_> = (0..12).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);
        assert_eq!(ledger.count(OperationStatus::Success), 12);
    }

    #[test]
    fn test_mode_scope() {
        let selected = ExecutionMode::CommitSelected(NameSet::from_csv("1, 2"));
        assert!(selected.includes("2"));
        assert!(!selected.includes("3"));
        assert!(!ExecutionMode::DryRun.includes("1"));
        assert!(ExecutionMode::CommitAll.includes("anything"));
        assert_eq!(selected.label(), "commit-selected");
    }
}

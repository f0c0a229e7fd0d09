//! Rename planning.
//!
//! Turns the scenes that pass a [`FilterSpec`] into [`PlannedOperation`]s. The
//! planner is purely computational: it never touches the filesystem, so the
//! same inputs always produce the same plan.

use crate::filter::FilterSpec;
use crate::path_builder::build_destination;
use crate::scene::SceneRecord;
use crate::template::{RenderSpec, TokenTable, render, sanitize_component};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Templates used to shorten a name whose destination path is too long.
const SHORT_TEMPLATE_WITH_DATE: &str = "$date - $title";
const SHORT_TEMPLATE: &str = "$title";

/// Where an operation is in its lifecycle.
///
/// Operations start `Pending`. Every other state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Success,
    Error,
    Duplicate,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Success => "success",
            OperationStatus::Error => "error",
            OperationStatus::Duplicate => "duplicate",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Problems with a scene record that prevent planning a rename for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("scene has no file path")]
    MissingFilePath,
    #[error("destination path too long ({len} > {max} characters)")]
    PathTooLong { len: usize, max: usize },
}

/// One planned rename of one scene's file.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOperation {
    pub scene_id: String,
    pub title: String,
    pub old_path: PathBuf,
    pub old_filename: String,
    pub new_path: PathBuf,
    pub new_filename: String,
    pub status: OperationStatus,
    pub error: Option<String>,
}

impl PlannedOperation {
    /// True when the file would actually move.
    pub fn is_rename(&self) -> bool {
        self.new_path != self.old_path
    }

    /// Directory the file is moved into.
    pub fn new_dir(&self) -> Option<&Path> {
        self.new_path.parent()
    }

    pub fn mark_duplicate(&mut self, message: impl Into<String>) -> bool {
        self.finish(OperationStatus::Duplicate, Some(message.into()))
    }

    pub fn mark_error(&mut self, message: impl Into<String>) -> bool {
        self.finish(OperationStatus::Error, Some(message.into()))
    }

    pub fn mark_success(&mut self) -> bool {
        self.finish(OperationStatus::Success, None)
    }

    /// Moves a pending operation into a terminal state. Terminal operations
    /// are left untouched and `false` is returned.
    fn finish(&mut self, status: OperationStatus, error: Option<String>) -> bool {
        if self.status != OperationStatus::Pending {
            return false;
        }
        self.status = status;
        self.error = error;
        true
    }
}

/// Plans renames for every scene that passes `filter`, in input order.
pub fn plan(
    scenes: &[SceneRecord],
    filter: &FilterSpec,
    render_spec: &RenderSpec,
) -> Vec<PlannedOperation> {
    scenes
        .iter()
        .filter(|scene| filter.matches(scene))
        .map(|scene| plan_scene(scene, render_spec))
        .collect()
}

/// Plans the rename of a single scene, ignoring filters.
pub fn plan_scene(scene: &SceneRecord, render_spec: &RenderSpec) -> PlannedOperation {
    let tokens = TokenTable::from_scene(scene, render_spec);
    let stem = render(&render_spec.filename_template, &tokens);

    let Some(old_path) = scene.file_path.as_deref() else {
        return PlannedOperation {
            scene_id: scene.id.clone(),
            title: scene.title.clone(),
            old_path: PathBuf::new(),
            old_filename: String::new(),
            new_path: PathBuf::new(),
            new_filename: stem,
            status: OperationStatus::Error,
            error: Some(PlanningError::MissingFilePath.to_string()),
        };
    };

    let old_filename = scene.file_basename().unwrap_or_default();
    let extension = old_path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned());
    let current_dir = old_path.parent().unwrap_or(Path::new(""));

    let new_filename = with_extension(stem, extension.as_deref());
    let new_dir = build_destination(
        render_spec.path_template.as_deref().unwrap_or_default(),
        &tokens,
        render_spec.path_is_absolute,
        current_dir,
    );

    let mut operation = PlannedOperation {
        scene_id: scene.id.clone(),
        title: scene.title.clone(),
        old_path: old_path.to_path_buf(),
        old_filename,
        new_path: new_dir.join(&new_filename),
        new_filename,
        status: OperationStatus::Pending,
        error: None,
    };

    if let Some(max) = render_spec.max_path_len
        && path_len(&operation.new_path) > max
    {
        shorten(&mut operation, scene, &tokens, current_dir, extension.as_deref(), max);
    }

    debug!(
        scene_id = %operation.scene_id,
        from = %operation.old_path.display(),
        to = %operation.new_path.display(),
        "planned rename"
    );
    operation
}

/// Re-renders an over-long name with a short template in the file's current
/// directory, or fails the operation if even that does not fit.
fn shorten(
    operation: &mut PlannedOperation,
    scene: &SceneRecord,
    tokens: &TokenTable,
    current_dir: &Path,
    extension: Option<&str>,
    max: usize,
) {
    let template = if scene.date.trim().is_empty() {
        SHORT_TEMPLATE
    } else {
        SHORT_TEMPLATE_WITH_DATE
    };
    let new_filename = with_extension(render(template, tokens), extension);
    let new_path = current_dir.join(&new_filename);
    let len = path_len(&new_path);

    debug!(scene_id = %scene.id, len, max, "destination path too long, shortening name");
    operation.new_filename = new_filename;
    operation.new_path = new_path;
    if len > max {
        operation.mark_error(PlanningError::PathTooLong { len, max }.to_string());
    }
}

/// Appends the original extension, cleaned like any other name component.
fn with_extension(stem: String, extension: Option<&str>) -> String {
    match extension.map(sanitize_component) {
        Some(ext) if !ext.is_empty() => format!("{stem}.{ext}"),
        _ => stem,
    }
}

fn path_len(path: &Path) -> usize {
    path.to_string_lossy().chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: &str, title: &str, path: &str) -> SceneRecord {
        SceneRecord {
            id: id.to_string(),
            title: title.to_string(),
            studio: Some("Acme".to_string()),
            date: "2024-01-15".to_string(),
            file_path: Some(PathBuf::from(path)),
            ..Default::default()
        }
    }

    fn render_spec(template: &str) -> RenderSpec {
        RenderSpec {
            filename_template: template.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_preserves_extension() {
        let scenes = [scene("1", "Intro", "/media/raw/file001.mp4")];
        let ops = plan(&scenes, &FilterSpec::default(), &render_spec("$studio - $date - $title"));

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].new_filename, "Acme - 2024-01-15 - Intro.mp4");
        assert_eq!(ops[0].old_filename, "file001.mp4");
        assert_eq!(
            ops[0].new_path,
            Path::new("/media/raw/Acme - 2024-01-15 - Intro.mp4")
        );
        assert_eq!(ops[0].status, OperationStatus::Pending);
    }

    #[test]
    fn test_in_place_rename_keeps_directory() {
        let scenes = [
            scene("1", "A", "/media/one/a.mkv"),
            scene("2", "B", "/media/two/deeper/b.mkv"),
        ];
        let ops = plan(&scenes, &FilterSpec::default(), &render_spec("$title"));
        for (op, scene) in ops.iter().zip(&scenes) {
            assert_eq!(op.new_dir(), scene.file_dir());
        }
    }

    #[test]
    fn test_plan_applies_filter_and_keeps_order() {
        let mut grouped = scene("2", "Grouped", "/media/b.mp4");
        grouped.groups = vec!["Series".to_string()];
        let scenes = [
            scene("3", "C", "/media/c.mp4"),
            grouped,
            scene("1", "A", "/media/a.mp4"),
        ];
        let filter = FilterSpec {
            skip_grouped: true,
            ..Default::default()
        };

        let ids: Vec<_> = plan(&scenes, &filter, &render_spec("$title"))
            .into_iter()
            .map(|op| op.scene_id)
            .collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn test_missing_path_is_planning_error() {
        let op = plan_scene(&SceneRecord::new("5"), &render_spec("$title"));
        assert_eq!(op.status, OperationStatus::Error);
        assert_eq!(op.error.as_deref(), Some("scene has no file path"));
        assert_eq!(op.new_filename, "scene-5");
    }

    #[test]
    fn test_path_template_moves_file() {
        let spec = RenderSpec {
            filename_template: "$title".to_string(),
            path_template: Some("$up/$studio".to_string()),
            ..Default::default()
        };
        let op = plan_scene(&scene("1", "Intro", "/media/inbox/x.mp4"), &spec);
        assert_eq!(op.new_path, Path::new("/media/Acme/Intro.mp4"));
    }

    #[test]
    fn test_long_path_is_shortened_in_current_directory() {
        let spec = RenderSpec {
            filename_template: "$studio - $date - $title - $title - $title".to_string(),
            path_template: Some("some/long/target/directory".to_string()),
            max_path_len: Some(40),
            ..Default::default()
        };
        let op = plan_scene(&scene("1", "Intro", "/m/x.mp4"), &spec);
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.new_path, Path::new("/m/2024-01-15 - Intro.mp4"));
    }

    #[test]
    fn test_path_too_long_even_when_shortened() {
        let spec = RenderSpec {
            filename_template: "$title".to_string(),
            max_path_len: Some(10),
            ..Default::default()
        };
        let op = plan_scene(&scene("1", "A rather long title", "/media/x.mp4"), &spec);
        assert_eq!(op.status, OperationStatus::Error);
        assert!(op.error.as_deref().unwrap_or_default().contains("too long"));
    }

    #[test]
    fn test_extension_is_sanitized() {
        let op = plan_scene(&scene("1", "T", "/m/a.m:p4"), &render_spec("$title"));
        assert_eq!(op.new_filename, "T.mp4");
        assert_eq!(op.new_path, Path::new("/m/T.mp4"));

        let op = plan_scene(&scene("2", "T", "/m/a.<>"), &render_spec("$title"));
        assert_eq!(op.new_filename, "T");
    }

    #[test]
    fn test_terminal_status_is_sticky() {
        let mut op = plan_scene(&scene("1", "A", "/m/a.mp4"), &render_spec("$title"));
        assert!(op.mark_duplicate("collides"));
        assert!(!op.mark_success());
        assert!(!op.mark_error("late"));
        assert_eq!(op.status, OperationStatus::Duplicate);
        assert_eq!(op.error.as_deref(), Some("collides"));
    }
}

//! Scene filtering.
//!
//! A [`FilterSpec`] is a conjunction of independent dimensions. Each dimension
//! that is unset or empty passes every scene; a multi-valued dimension passes
//! when any of its members matches.

use crate::name_set::NameSet;
use crate::scene::{Gender, SceneRecord};
use std::collections::BTreeSet;

/// Three-way boolean filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriState {
    /// No constraint.
    #[default]
    Any,
    /// The flag must be set.
    Yes,
    /// The flag must be clear.
    No,
}

impl TriState {
    /// Returns true when `value` satisfies this constraint.
    pub fn admits(self, value: bool) -> bool {
        match self {
            TriState::Any => true,
            TriState::Yes => value,
            TriState::No => !value,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value { TriState::Yes } else { TriState::No }
    }
}

/// Which scenes a run considers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    /// Substring the file path must contain. `%` wildcards are ignored.
    pub path_include: Option<String>,
    /// Substring the file path must not contain. `%` wildcards are ignored.
    pub path_exclude: Option<String>,
    /// Drop scenes that belong to any group.
    pub skip_grouped: bool,
    /// Tags used to select scenes from the catalog.
    pub selection_tags: NameSet,
    pub studio_names: NameSet,
    pub group_names: NameSet,
    pub tag_names: NameSet,
    /// At least one performer must have one of these genders.
    pub performer_genders: BTreeSet<Gender>,
    pub organized: TriState,
    pub interactive: TriState,
    pub min_marker_count: Option<usize>,
}

impl FilterSpec {
    /// Returns true when `scene` satisfies every configured dimension.
    pub fn matches(&self, scene: &SceneRecord) -> bool {
        self.path_matches(scene)
            && !(self.skip_grouped && !scene.groups.is_empty())
            && self.studio_matches(scene)
            && any_member(&self.group_names, &scene.groups)
            && any_member(&self.tag_names, &scene.tags)
            && any_member(&self.selection_tags, &scene.tags)
            && self.gender_matches(scene)
            && self.organized.admits(scene.organized)
            && self.interactive.admits(scene.interactive)
            && self
                .min_marker_count
                .is_none_or(|threshold| scene.marker_count >= threshold)
    }

    fn path_matches(&self, scene: &SceneRecord) -> bool {
        let path = scene
            .file_path
            .as_deref()
            .map(|p| p.to_string_lossy().into_owned());

        if let Some(include) = like_substring(self.path_include.as_deref()) {
            match &path {
                Some(path) if path.contains(&include) => {}
                _ => return false,
            }
        }
        if let Some(exclude) = like_substring(self.path_exclude.as_deref())
            && let Some(path) = &path
            && path.contains(&exclude)
        {
            return false;
        }
        true
    }

    fn studio_matches(&self, scene: &SceneRecord) -> bool {
        if self.studio_names.is_empty() {
            return true;
        }
        scene
            .studio
            .as_deref()
            .is_some_and(|studio| self.studio_names.contains(studio))
    }

    fn gender_matches(&self, scene: &SceneRecord) -> bool {
        if self.performer_genders.is_empty() {
            return true;
        }
        scene
            .performers
            .iter()
            .any(|p| gender_selected(&self.performer_genders, p.gender))
    }
}

/// Free-function form of [`FilterSpec::matches`].
pub fn matches(scene: &SceneRecord, filter: &FilterSpec) -> bool {
    filter.matches(scene)
}

/// Returns true when a performer gender is in `set`. An unset gender only
/// matches when `UNKNOWN` is selected.
pub fn gender_selected(set: &BTreeSet<Gender>, gender: Option<Gender>) -> bool {
    set.contains(&gender.unwrap_or(Gender::Unknown))
}

fn any_member(filter: &NameSet, names: &[String]) -> bool {
    filter.is_empty() || names.iter().any(|name| filter.contains(name))
}

/// Strips LIKE-style `%` wildcards. An empty result means "no constraint".
fn like_substring(pattern: Option<&str>) -> Option<String> {
    let stripped = pattern?.replace('%', "");
    if stripped.is_empty() { None } else { Some(stripped) }
}

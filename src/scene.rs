//! Scene records as the renamer sees them.
//!
//! The catalog hands scenes out in its own nested wire shape ([`SceneWire`]).
//! [`SceneRecord`] is the flat, read-only snapshot the rest of the crate works
//! on; it is built once per run and never mutated.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Performer gender as the catalog reports it.
///
/// `Unknown` is the pseudo-gender used by settings to select performers whose
/// gender is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    TransgenderMale,
    TransgenderFemale,
    Intersex,
    NonBinary,
    Unknown,
}

impl Gender {
    /// Parses a gender name case-insensitively. Returns `None` for values
    /// outside the known set.
    ///
    /// # Examples
    ///
    /// ```
    /// use scene_renamer::scene::Gender;
    ///
    /// assert_eq!(Gender::parse("female"), Some(Gender::Female));
    /// assert_eq!(Gender::parse(" NON_BINARY "), Some(Gender::NonBinary));
    /// assert_eq!(Gender::parse("robot"), None);
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "MALE" => Some(Gender::Male),
            "FEMALE" => Some(Gender::Female),
            "TRANSGENDER_MALE" => Some(Gender::TransgenderMale),
            "TRANSGENDER_FEMALE" => Some(Gender::TransgenderFemale),
            "INTERSEX" => Some(Gender::Intersex),
            "NON_BINARY" => Some(Gender::NonBinary),
            "UNKNOWN" => Some(Gender::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::TransgenderMale => "TRANSGENDER_MALE",
            Gender::TransgenderFemale => "TRANSGENDER_FEMALE",
            Gender::Intersex => "INTERSEX",
            Gender::NonBinary => "NON_BINARY",
            Gender::Unknown => "UNKNOWN",
        }
    }
}

/// A performer credited on a scene.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Performer {
    pub name: String,
    /// `None` when the catalog has no gender for this performer.
    pub gender: Option<Gender>,
}

impl Performer {
    pub fn new(name: impl Into<String>, gender: Option<Gender>) -> Self {
        Self {
            name: name.into(),
            gender,
        }
    }
}

/// Read-only snapshot of one catalogued scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneRecord {
    pub id: String,
    pub title: String,
    pub code: String,
    pub details: String,
    pub director: String,
    pub urls: Vec<String>,
    pub date: String,
    pub rating100: Option<i64>,
    pub organized: bool,
    pub o_counter: Option<i64>,
    pub interactive: bool,
    pub interactive_speed: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub last_played_at: String,
    pub resume_time: Option<f64>,
    pub play_duration: Option<f64>,
    pub play_count: Option<i64>,
    pub studio: Option<String>,
    pub performers: Vec<Performer>,
    pub tags: Vec<String>,
    pub groups: Vec<String>,
    pub marker_count: usize,
    /// Path of the scene's primary file. `None` when the scene has no files.
    pub file_path: Option<PathBuf>,
}

impl SceneRecord {
    /// Creates an otherwise empty record with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// File name component of the primary file.
    pub fn file_basename(&self) -> Option<String> {
        self.file_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Directory holding the primary file.
    pub fn file_dir(&self) -> Option<&Path> {
        self.file_path.as_deref().and_then(Path::parent)
    }
}

/// A scene in the catalog's wire shape.
///
/// Every field but `id` is optional on the wire; absent values become empty
/// strings, `None`, or empty collections in the converted record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneWire {
    pub id: String,
    pub title: Option<String>,
    pub code: Option<String>,
    pub details: Option<String>,
    pub director: Option<String>,
    pub urls: Vec<String>,
    pub date: Option<String>,
    pub rating100: Option<i64>,
    pub organized: Option<bool>,
    pub o_counter: Option<i64>,
    pub interactive: Option<bool>,
    pub interactive_speed: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub last_played_at: Option<String>,
    pub resume_time: Option<f64>,
    pub play_duration: Option<f64>,
    pub play_count: Option<i64>,
    pub files: Vec<FileWire>,
    pub studio: Option<NameWire>,
    pub performers: Vec<PerformerWire>,
    pub tags: Vec<NameWire>,
    pub groups: Vec<GroupWire>,
    pub scene_markers: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWire {
    pub id: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NameWire {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformerWire {
    pub name: String,
    pub gender: Option<String>,
}

/// Group membership; the catalog nests the group itself one level down.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupWire {
    pub group: Option<NameWire>,
}

impl From<SceneWire> for SceneRecord {
    fn from(wire: SceneWire) -> Self {
        let file_path = wire
            .files
            .iter()
            .map(|file| file.path.trim())
            .find(|path| !path.is_empty())
            .map(PathBuf::from);

        Self {
            id: wire.id,
            title: wire.title.unwrap_or_default(),
            code: wire.code.unwrap_or_default(),
            details: wire.details.unwrap_or_default(),
            director: wire.director.unwrap_or_default(),
            urls: wire.urls,
            date: wire.date.unwrap_or_default(),
            rating100: wire.rating100,
            organized: wire.organized.unwrap_or(false),
            o_counter: wire.o_counter,
            interactive: wire.interactive.unwrap_or(false),
            interactive_speed: wire.interactive_speed,
            created_at: wire.created_at.unwrap_or_default(),
            updated_at: wire.updated_at.unwrap_or_default(),
            last_played_at: wire.last_played_at.unwrap_or_default(),
            resume_time: wire.resume_time,
            play_duration: wire.play_duration,
            play_count: wire.play_count,
            studio: wire
                .studio
                .map(|studio| studio.name.trim().to_string())
                .filter(|name| !name.is_empty()),
            performers: wire
                .performers
                .into_iter()
                .map(|p| Performer {
                    name: p.name,
                    gender: p.gender.as_deref().and_then(Gender::parse),
                })
                .collect(),
            tags: wire.tags.into_iter().map(|tag| tag.name).collect(),
            groups: wire
                .groups
                .into_iter()
                .filter_map(|membership| membership.group)
                .map(|group| group.name)
                .collect(),
            marker_count: wire.scene_markers.len(),
            file_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_conversion_flattens_nested_names() {
        let json = r#"{
            "id": "42",
            "title": "Intro",
            "organized": true,
            "files": [{"id": "7", "path": "/media/a/intro.mp4"}],
            "studio": {"name": "Acme"},
            "performers": [{"name": "Ann", "gender": "FEMALE"}, {"name": "Bo", "gender": null}],
            "tags": [{"name": "outdoor"}],
            "groups": [{"group": {"name": "Series"}}],
            "scene_markers": [{"id": "1"}, {"id": "2"}]
        }"#;
        let wire: SceneWire = serde_json::from_str(json).expect("valid wire json");
        let scene = SceneRecord::from(wire);

        assert_eq!(scene.id, "42");
        assert_eq!(scene.studio.as_deref(), Some("Acme"));
        assert_eq!(scene.performers[0].gender, Some(Gender::Female));
        assert_eq!(scene.performers[1].gender, None);
        assert_eq!(scene.groups, vec!["Series"]);
        assert_eq!(scene.marker_count, 2);
        assert!(scene.organized);
        assert!(!scene.interactive);
        assert_eq!(scene.file_basename().as_deref(), Some("intro.mp4"));
        assert_eq!(scene.file_dir(), Some(Path::new("/media/a")));
    }

    #[test]
    fn test_scene_without_files_has_no_path() {
        let wire: SceneWire = serde_json::from_str(r#"{"id": "1"}"#).expect("valid wire json");
        let scene = SceneRecord::from(wire);
        assert!(scene.file_path.is_none());
        assert!(scene.file_basename().is_none());
    }

    #[test]
    fn test_blank_studio_name_is_none() {
        let wire: SceneWire =
            serde_json::from_str(r#"{"id": "1", "studio": {"name": "  "}}"#).expect("valid json");
        assert_eq!(SceneRecord::from(wire).studio, None);
    }
}

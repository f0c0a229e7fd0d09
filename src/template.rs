//! Token resolution and template rendering.
//!
//! Templates are plain text with `$name` placeholders, for example
//! `"$studio - $date - $title"`. Rendering never fails: placeholders that do
//! not name a known token are copied through verbatim, and a name that
//! sanitizes away to nothing falls back to `scene-<id>`.
//!
//! # Examples
//!
//! ```
//! use scene_renamer::scene::SceneRecord;
//! use scene_renamer::template::{render, RenderSpec, TokenTable};
//!
//! let scene = SceneRecord {
//!     id: "1".to_string(),
//!     title: "Intro".to_string(),
//!     studio: Some("Acme".to_string()),
//!     date: "2024-01-15".to_string(),
//!     ..Default::default()
//! };
//! let tokens = TokenTable::from_scene(&scene, &RenderSpec::default());
//! assert_eq!(render("$studio - $date - $title", &tokens), "Acme - 2024-01-15 - Intro");
//! ```

use crate::filter::gender_selected;
use crate::scene::{Gender, SceneRecord};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

/// Filename template used when settings do not provide one.
pub const DEFAULT_FILENAME_TEMPLATE: &str = "$studio - $date - $title - $performer";

/// Every token name a template may reference.
pub const TOKEN_NAMES: &[&str] = &[
    "id",
    "title",
    "code",
    "details",
    "director",
    "urls",
    "date",
    "rating100",
    "organized",
    "o_counter",
    "interactive",
    "interactive_speed",
    "created_at",
    "updated_at",
    "last_played_at",
    "resume_time",
    "play_duration",
    "play_count",
    "tags",
    "groups",
    "scene_markers_count",
    "performers",
    "performer",
    "studio",
    "height",
];

/// Characters that are illegal in a path component on at least one common
/// filesystem.
const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("failed to compile whitespace regex"));
static REPEATED_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s*-\s*){2,}").expect("failed to compile separator regex"));
static LEADING_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-–—_:|,]+\s*").expect("failed to compile separator regex"));
static TRAILING_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[-–—_:|,]+\s*$").expect("failed to compile separator regex"));
static EMPTY_BRACKETS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\W*\]|\(\W*\)|\{\W*\}").expect("failed to compile bracket regex")
});

/// How planned names and directories are rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSpec {
    pub filename_template: String,
    /// Destination directory template. `None` or blank renames in place.
    pub path_template: Option<String>,
    /// Root the path template at the filesystem root instead of the file's
    /// current directory.
    pub path_is_absolute: bool,
    /// Genders whose performers appear in `$performer`/`$performers`. Empty
    /// means every performer.
    pub token_performer_genders: BTreeSet<Gender>,
    /// Longest destination path accepted before the name is shortened.
    pub max_path_len: Option<usize>,
}

impl Default for RenderSpec {
    fn default() -> Self {
        Self {
            filename_template: DEFAULT_FILENAME_TEMPLATE.to_string(),
            path_template: None,
            path_is_absolute: false,
            token_performer_genders: BTreeSet::new(),
            max_path_len: None,
        }
    }
}

/// Token values resolved for one scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenTable {
    scene_id: String,
    values: HashMap<&'static str, String>,
}

impl TokenTable {
    /// Resolves every known token for `scene`. Missing values are empty.
    pub fn from_scene(scene: &SceneRecord, render: &RenderSpec) -> Self {
        let performers = scene
            .performers
            .iter()
            .filter(|p| {
                render.token_performer_genders.is_empty()
                    || gender_selected(&render.token_performer_genders, p.gender)
            })
            .map(|p| p.name.trim())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let mut table = Self {
            scene_id: scene.id.clone(),
            values: HashMap::new(),
        };
        table.set("id", &scene.id);
        table.set("title", &scene.title);
        table.set("code", &scene.code);
        table.set("details", &scene.details);
        table.set("director", &scene.director);
        table.set("urls", &join_names(scene.urls.iter(), false));
        table.set("date", &scene.date);
        table.set("rating100", &display_opt(scene.rating100));
        table.set("organized", &scene.organized.to_string());
        table.set("o_counter", &display_opt(scene.o_counter));
        table.set("interactive", &scene.interactive.to_string());
        table.set("interactive_speed", &display_opt(scene.interactive_speed));
        table.set("created_at", &scene.created_at);
        table.set("updated_at", &scene.updated_at);
        table.set("last_played_at", &scene.last_played_at);
        table.set("resume_time", &display_opt(scene.resume_time));
        table.set("play_duration", &display_opt(scene.play_duration));
        table.set("play_count", &display_opt(scene.play_count));
        table.set("tags", &join_names(scene.tags.iter(), true));
        table.set("groups", &join_names(scene.groups.iter(), true));
        table.set("scene_markers_count", &scene.marker_count.to_string());
        table.set("performers", &performers);
        table.set("performer", &performers);
        table.set("studio", scene.studio.as_deref().unwrap_or_default());
        table.set("height", "");
        table
    }

    /// Value of a token, or `None` for names outside [`TOKEN_NAMES`].
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    /// Overrides one token value. Names outside [`TOKEN_NAMES`] are ignored.
    pub fn set(&mut self, name: &str, value: &str) {
        if let Some(known) = TOKEN_NAMES.iter().copied().find(|known| *known == name) {
            self.values.insert(known, value.trim().to_string());
        }
    }
}

/// Result of raw token substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub text: String,
    /// At least one substituted token resolved to the empty string.
    pub had_empty: bool,
}

/// Replaces `$token` placeholders without any cleanup.
///
/// At each `$` the longest token name that prefixes the following identifier
/// wins, so `$details` is never read as `$date` + `ails`. A `$` that starts no
/// known token is kept as is.
pub fn substitute(template: &str, tokens: &TokenTable) -> Substitution {
    let mut text = String::with_capacity(template.len());
    let mut had_empty = false;
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        text.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let ident_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());

        match longest_token(&after[..ident_len]) {
            Some(name) => {
                let value = tokens.get(name).unwrap_or_default();
                had_empty |= value.is_empty();
                text.push_str(value);
                rest = &after[name.len()..];
            }
            None => {
                text.push('$');
                rest = after;
            }
        }
    }
    text.push_str(rest);

    Substitution { text, had_empty }
}

/// Renders a template into a single sanitized path component. May be empty.
pub fn render_component(template: &str, tokens: &TokenTable) -> String {
    let substitution = substitute(template, tokens);
    if substitution.had_empty {
        sanitize_component(&tidy_separators(&substitution.text))
    } else {
        sanitize_component(&substitution.text)
    }
}

/// Renders a filename stem. Never empty: falls back to `scene-<id>`.
pub fn render(template: &str, tokens: &TokenTable) -> String {
    let name = render_component(template, tokens);
    if !name.is_empty() {
        return name;
    }
    let fallback = sanitize_component(&format!("scene-{}", tokens.scene_id()));
    if fallback.is_empty() {
        "scene".to_string()
    } else {
        fallback
    }
}

/// Removes filesystem-illegal and control characters, collapses whitespace
/// runs, and trims.
pub fn sanitize_component(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect();
    WHITESPACE_RUN
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

/// Cleans up separators left dangling by empty tokens.
fn tidy_separators(text: &str) -> String {
    let text = REPEATED_SEPARATORS.replace_all(text, " - ");
    let text = EMPTY_BRACKETS.replace_all(&text, "");
    let text = LEADING_SEPARATORS.replace(&text, "");
    let text = TRAILING_SEPARATORS.replace(&text, "");
    text.into_owned()
}

fn longest_token(ident: &str) -> Option<&'static str> {
    TOKEN_NAMES
        .iter()
        .copied()
        .filter(|name| ident.starts_with(name))
        .max_by_key(|name| name.len())
}

fn join_names<'a>(names: impl Iterator<Item = &'a String>, sort: bool) -> String {
    let mut names: Vec<&str> = names
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    if sort {
        names.sort_unstable();
    }
    names.join(" ")
}

fn display_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Destination directory construction from path templates.
///
/// A path template uses the same tokens as filename templates, with `/` (or
/// `\`) separating directory levels and `$up` stepping one level up from the
/// file's current directory. Each level is rendered and sanitized on its own,
/// so a token value containing a slash never adds a directory level.
use crate::template::{TokenTable, render_component};
use std::path::{Component, MAIN_SEPARATOR_STR, Path, PathBuf};
use tracing::warn;

const UP_TOKEN: &str = "$up";
const SEPARATORS: &[char] = &['-', '–', '—', '_', ':', '|', ','];

/// Resolves the directory a scene's file should live in.
///
/// # Arguments
///
/// * `path_template` - Directory template; blank means "stay where you are"
/// * `tokens` - Token values of the scene being planned
/// * `is_absolute` - Root the template at the filesystem root
/// * `current_dir` - Directory currently holding the file
///
/// # Examples
///
/// ```
/// use scene_renamer::path_builder::build_destination;
/// use scene_renamer::scene::SceneRecord;
/// use scene_renamer::template::{RenderSpec, TokenTable};
/// use std::path::Path;
///
/// let scene = SceneRecord { studio: Some("Acme".to_string()), ..SceneRecord::new("1") };
/// let tokens = TokenTable::from_scene(&scene, &RenderSpec::default());
///
/// let dir = build_destination("$up/$studio", &tokens, false, Path::new("/media/inbox"));
/// assert_eq!(dir, Path::new("/media/Acme"));
/// ```
pub fn build_destination(
    path_template: &str,
    tokens: &TokenTable,
    is_absolute: bool,
    current_dir: &Path,
) -> PathBuf {
    let template = path_template.trim();
    if template.is_empty() {
        return current_dir.to_path_buf();
    }

    let mut destination = if is_absolute {
        root_of(current_dir)
    } else {
        normalize(current_dir)
    };

    for segment in template.split(['/', '\\']).map(str::trim) {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            ascend(&mut destination);
            continue;
        }
        let (levels, rest) = split_up_prefix(segment);
        if levels > 0 {
            if is_absolute {
                warn!(template = path_template, "$up has no meaning in an absolute path template; ignored");
            } else {
                for _ in 0..levels {
                    ascend(&mut destination);
                }
            }
        }
        if rest.is_empty() {
            continue;
        }

        let (rest, dropped) = strip_up_tokens(rest);
        if dropped {
            warn!(template = path_template, segment, "$up is only honored at the start of a level; dropped");
        }
        let rendered = render_component(&rest, tokens);
        if rendered.is_empty() || rendered == "." || rendered == ".." {
            continue;
        }
        destination.push(rendered);
    }

    destination
}

/// Resolves `.` and `..` components lexically, never climbing above the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => ascend(&mut normalized),
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Splits the leading `$up` tokens off a segment, returning how many there were
/// and what follows them.
fn split_up_prefix(segment: &str) -> (usize, &str) {
    let mut rest = segment;
    let mut levels = 0;
    while let Some(tail) = strip_up(rest) {
        levels += 1;
        rest = tail.trim_start();
    }
    if levels > 0 {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || SEPARATORS.contains(&c));
    }
    (levels, rest)
}

/// Removes `$up` tokens found past the start of a level.
fn strip_up_tokens(text: &str) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut dropped = false;
    let mut rest = text;
    while let Some(pos) = rest.find(UP_TOKEN) {
        out.push_str(&rest[..pos]);
        match strip_up(&rest[pos..]) {
            Some(tail) => {
                dropped = true;
                rest = tail;
            }
            None => {
                out.push_str(UP_TOKEN);
                rest = &rest[pos + UP_TOKEN.len()..];
            }
        }
    }
    out.push_str(rest);
    (out, dropped)
}

/// Strips one `$up` from the front unless it is the start of a longer name.
fn strip_up(text: &str) -> Option<&str> {
    let tail = text.strip_prefix(UP_TOKEN)?;
    match tail.chars().next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => None,
        _ => Some(tail),
    }
}

fn ascend(path: &mut PathBuf) {
    match path.components().next_back() {
        Some(Component::Normal(_)) => {
            path.pop();
        }
        Some(Component::RootDir | Component::Prefix(_)) => {}
        Some(Component::ParentDir | Component::CurDir) | None => path.push(".."),
    }
}

/// Root (drive prefix and root directory) of `path`, or `/` if it has none.
fn root_of(path: &Path) -> PathBuf {
    let root: PathBuf = path
        .components()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect();
    if root.as_os_str().is_empty() {
        PathBuf::from(MAIN_SEPARATOR_STR)
    } else {
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneRecord;
    use crate::template::RenderSpec;

    fn tokens() -> TokenTable {
        let scene = SceneRecord {
            id: "3".to_string(),
            title: "AC/DC Live".to_string(),
            studio: Some("Acme".to_string()),
            date: "2024-01-15".to_string(),
            ..Default::default()
        };
        TokenTable::from_scene(&scene, &RenderSpec::default())
    }

    #[test]
    fn test_empty_template_keeps_current_directory() {
        let current = Path::new("/media/inbox");
        assert_eq!(build_destination("", &tokens(), false, current), current);
        assert_eq!(build_destination("   ", &tokens(), true, current), current);
    }

    #[test]
    fn test_relative_template_joins_under_current_directory() {
        let dir = build_destination("$studio/$date", &tokens(), false, Path::new("/media/inbox"));
        assert_eq!(dir, Path::new("/media/inbox/Acme/2024-01-15"));
    }

    #[test]
    fn test_up_ascends_before_joining() {
        let current = Path::new("/media/inbox/new");
        assert_eq!(
            build_destination("$up/$up/$studio", &tokens(), false, current),
            Path::new("/media/Acme")
        );
        assert_eq!(
            build_destination("$up$up/sorted", &tokens(), false, current),
            Path::new("/media/sorted")
        );
        assert_eq!(
            build_destination("a/$up/b", &tokens(), false, current),
            Path::new("/media/inbox/new/b")
        );
    }

    #[test]
    fn test_up_prefix_inside_a_level() {
        let current = Path::new("/m/in");
        assert_eq!(build_destination("$up$studio", &tokens(), false, current), Path::new("/m/Acme"));
        assert_eq!(
            build_destination("$up - $studio", &tokens(), false, current),
            Path::new("/m/Acme")
        );
        assert_eq!(
            build_destination("$up $up/$studio", &tokens(), false, current),
            Path::new("/Acme")
        );
    }

    #[test]
    fn test_up_after_text_is_dropped() {
        let dir = build_destination("by $up$studio", &tokens(), false, Path::new("/m/in"));
        assert_eq!(dir, Path::new("/m/in/by Acme"));
    }

    #[test]
    fn test_longer_names_starting_with_up_are_kept() {
        let dir = build_destination("$upload", &tokens(), false, Path::new("/m/in"));
        assert_eq!(dir, Path::new("/m/in/$upload"));
    }

    #[test]
    fn test_up_never_climbs_above_root() {
        let dir = build_destination("$up/$up/$up/$studio", &tokens(), false, Path::new("/media"));
        assert_eq!(dir, Path::new("/Acme"));
    }

    #[test]
    fn test_absolute_template_is_rooted() {
        let dir = build_destination("library/$studio", &tokens(), true, Path::new("/media/inbox"));
        assert_eq!(dir, Path::new("/library/Acme"));
    }

    #[test]
    fn test_up_is_ignored_in_absolute_mode() {
        let dir = build_destination("$up/library", &tokens(), true, Path::new("/media/inbox"));
        assert_eq!(dir, Path::new("/library"));
    }

    #[test]
    fn test_token_values_cannot_add_levels() {
        let dir = build_destination("$title", &tokens(), false, Path::new("/media"));
        assert_eq!(dir, Path::new("/media/ACDC Live"));
    }

    #[test]
    fn test_empty_segments_are_dropped() {
        let dir = build_destination("$code//./$studio", &tokens(), false, Path::new("/media"));
        assert_eq!(dir, Path::new("/media/Acme"));
    }

    #[test]
    fn test_normalize_resolves_dots() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), Path::new("/a/c"));
        assert_eq!(normalize(Path::new("/../a")), Path::new("/a"));
        assert_eq!(normalize(Path::new("../a")), Path::new("../a"));
    }
}

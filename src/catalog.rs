//! Paginated read access to the metadata catalog.
//!
//! The catalog itself lives elsewhere; this module defines the page-level
//! [`Catalog`] interface, the loops that drain it, and [`JsonCatalog`], an
//! implementation backed by a JSON export of the catalog.
//!
//! # Export Format
//!
//! ```json
//! {
//!   "scenes": [{ "id": "1", "title": "Intro", "files": [{ "path": "/media/a.mp4" }] }],
//!   "tags": [{ "name": "outdoor" }],
//!   "studios": [{ "name": "Acme" }],
//!   "groups": [{ "name": "Series" }]
//! }
//! ```

use crate::name_set::NameSet;
use crate::scene::{NameWire, SceneRecord, SceneWire};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Page size used when none is configured.
pub const DEFAULT_PER_PAGE: usize = 100;

/// Entity kinds the catalog serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Scene,
    Tag,
    Studio,
    Group,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Scene => "scenes",
            EntityKind::Tag => "tags",
            EntityKind::Studio => "studios",
            EntityKind::Group => "groups",
        };
        f.write_str(name)
    }
}

/// Server-side predicate for a fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    /// Only scenes carrying at least one of these tags. Empty means all.
    pub tags_any: NameSet,
}

impl CatalogFilter {
    pub fn with_tags(tags: NameSet) -> Self {
        Self { tags_any: tags }
    }
}

/// One item of a page.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogItem {
    Scene(Box<SceneRecord>),
    Name(String),
}

/// One page of results and, when the catalog knows it, the total count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogPage {
    pub count: Option<usize>,
    pub items: Vec<CatalogItem>,
}

/// Errors raised while reading the catalog. Any of them aborts the run.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to fetch {kind} page {page}: {reason}")]
    Page {
        kind: EntityKind,
        page: usize,
        reason: String,
    },
    #[error("page size must be at least 1")]
    InvalidPageSize,
    #[error("unexpected item in {kind} results")]
    UnexpectedItem { kind: EntityKind },
    #[error("failed to read catalog export {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog export: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Page-level read access to catalog entities.
///
/// Pages are numbered from 1. Implementations must be safe to call from
/// several threads at once; independent kinds are fetched concurrently.
pub trait Catalog: Sync {
    fn fetch_page(
        &self,
        kind: EntityKind,
        filter: &CatalogFilter,
        page: usize,
        per_page: usize,
    ) -> Result<CatalogPage, QueryError>;
}

/// Sorted name lists of the catalog kinds used for lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogLookups {
    pub tags: NameSet,
    pub studios: NameSet,
    pub groups: NameSet,
}

/// Drains every page of `kind` in order.
///
/// Stops once `page * per_page` reaches the reported count, or when a page
/// comes back short. The first failing page aborts the whole fetch.
pub fn fetch_all<C: Catalog + ?Sized>(
    catalog: &C,
    kind: EntityKind,
    filter: &CatalogFilter,
    per_page: usize,
) -> Result<Vec<CatalogItem>, QueryError> {
    if per_page == 0 {
        return Err(QueryError::InvalidPageSize);
    }

    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let result = catalog.fetch_page(kind, filter, page, per_page)?;
        let received = result.items.len();
        debug!(%kind, page, received, count = ?result.count, "fetched catalog page");
        items.extend(result.items);

        let exhausted = match result.count {
            Some(count) => page * per_page >= count,
            None => false,
        };
        if exhausted || received < per_page {
            break;
        }
        page += 1;
    }
    Ok(items)
}

/// Fetches every scene matching `filter`, in catalog order.
pub fn fetch_all_scenes<C: Catalog + ?Sized>(
    catalog: &C,
    filter: &CatalogFilter,
    per_page: usize,
) -> Result<Vec<SceneRecord>, QueryError> {
    let scenes = fetch_all(catalog, EntityKind::Scene, filter, per_page)?
        .into_iter()
        .map(|item| match item {
            CatalogItem::Scene(scene) => Ok(*scene),
            CatalogItem::Name(_) => Err(QueryError::UnexpectedItem {
                kind: EntityKind::Scene,
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    info!(count = scenes.len(), "fetched scenes");
    Ok(scenes)
}

/// Fetches the deduplicated, name-sorted list of one lookup kind.
pub fn fetch_names<C: Catalog + ?Sized>(
    catalog: &C,
    kind: EntityKind,
    per_page: usize,
) -> Result<NameSet, QueryError> {
    let names = fetch_all(catalog, kind, &CatalogFilter::default(), per_page)?
        .into_iter()
        .map(|item| match item {
            CatalogItem::Name(name) => Ok(name),
            CatalogItem::Scene(_) => Err(QueryError::UnexpectedItem { kind }),
        })
        .collect::<Result<NameSet, _>>()?;
    Ok(names.sorted())
}

/// Fetches tags, studios and groups concurrently.
pub fn fetch_lookups<C: Catalog + ?Sized>(
    catalog: &C,
    per_page: usize,
) -> Result<CatalogLookups, QueryError> {
    let (tags, (studios, groups)) = rayon::join(
        || fetch_names(catalog, EntityKind::Tag, per_page),
        || {
            rayon::join(
                || fetch_names(catalog, EntityKind::Studio, per_page),
                || fetch_names(catalog, EntityKind::Group, per_page),
            )
        },
    );
    Ok(CatalogLookups {
        tags: tags?,
        studios: studios?,
        groups: groups?,
    })
}

/// A catalog served from a JSON export held in memory.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    scenes: Vec<SceneRecord>,
    tags: Vec<String>,
    studios: Vec<String>,
    groups: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogExport {
    scenes: Vec<SceneWire>,
    tags: Vec<NameWire>,
    studios: Vec<NameWire>,
    groups: Vec<NameWire>,
}

impl JsonCatalog {
    /// Loads an export file from disk.
    pub fn load(path: &Path) -> Result<Self, QueryError> {
        let content = fs::read_to_string(path).map_err(|e| QueryError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Parses an export document.
    pub fn from_json(content: &str) -> Result<Self, QueryError> {
        let export: CatalogExport = serde_json::from_str(content)?;
        Ok(Self {
            scenes: export.scenes.into_iter().map(SceneRecord::from).collect(),
            tags: export.tags.into_iter().map(|t| t.name).collect(),
            studios: export.studios.into_iter().map(|s| s.name).collect(),
            groups: export.groups.into_iter().map(|g| g.name).collect(),
        })
    }

    /// Builds a catalog from records already in memory.
    pub fn from_scenes(scenes: Vec<SceneRecord>) -> Self {
        let mut catalog = Self {
            scenes,
            ..Default::default()
        };
        for scene in &catalog.scenes {
            catalog.tags.extend(scene.tags.iter().cloned());
            catalog.groups.extend(scene.groups.iter().cloned());
            catalog.studios.extend(scene.studio.iter().cloned());
        }
        catalog
    }
}

impl Catalog for JsonCatalog {
    fn fetch_page(
        &self,
        kind: EntityKind,
        filter: &CatalogFilter,
        page: usize,
        per_page: usize,
    ) -> Result<CatalogPage, QueryError> {
        if page == 0 {
            return Err(QueryError::Page {
                kind,
                page,
                reason: "pages are numbered from 1".to_string(),
            });
        }
        let offset = (page - 1).saturating_mul(per_page);
        let result = match kind {
            EntityKind::Scene => {
                let selected = || {
                    self.scenes.iter().filter(|scene| {
                        filter.tags_any.is_empty()
                            || scene.tags.iter().any(|tag| filter.tags_any.contains(tag))
                    })
                };
                CatalogPage {
                    count: Some(selected().count()),
                    items: selected()
                        .skip(offset)
                        .take(per_page)
                        .map(|scene| CatalogItem::Scene(Box::new(scene.clone())))
                        .collect(),
                }
            }
            EntityKind::Tag => name_page(&self.tags, offset, per_page),
            EntityKind::Studio => name_page(&self.studios, offset, per_page),
            EntityKind::Group => name_page(&self.groups, offset, per_page),
        };
        Ok(result)
    }
}

fn name_page(values: &[String], offset: usize, per_page: usize) -> CatalogPage {
    CatalogPage {
        count: Some(values.len()),
        items: values
            .iter()
            .skip(offset)
            .take(per_page)
            .cloned()
            .map(CatalogItem::Name)
            .collect(),
    }
}

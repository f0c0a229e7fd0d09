//! Run orchestration.
//!
//! Wires the stages together in order: catalog lookups, scene fetch, filter
//! and plan, conflict resolution, then execution. Every scene of every pass is
//! fetched before anything is planned, so a failing page aborts the run with
//! no partial plan.

use crate::catalog::{
    Catalog, CatalogFilter, CatalogLookups, DEFAULT_PER_PAGE, QueryError, fetch_all_scenes,
    fetch_lookups,
};
use crate::config::RunSettings;
use crate::conflict::{PathComparison, resolve};
use crate::executor::{ExecutionMode, Executor};
use crate::filesystem::FileSystem;
use crate::filter::FilterSpec;
use crate::ledger::Ledger;
use crate::name_set::NameSet;
use crate::planner::{PlannedOperation, plan};
use crate::template::RenderSpec;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Knobs that shape how a run talks to the catalog and the disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub per_page: usize,
    pub jobs: usize,
    pub comparison: PathComparison,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            jobs: 1,
            comparison: PathComparison::native(),
        }
    }
}

/// One filter/template combination planned over its own scene fetch.
#[derive(Debug, Clone)]
struct Pass {
    filter: FilterSpec,
    render: RenderSpec,
}

/// Fetches, filters and plans, then resolves conflicts across the whole plan.
///
/// # Errors
///
/// Returns the first catalog failure. Per-scene problems never fail the call;
/// they come back as `error` or `duplicate` operations.
pub fn plan_run<C, F>(
    catalog: &C,
    fs: &F,
    settings: &RunSettings,
    options: &RunOptions,
) -> Result<Vec<PlannedOperation>, QueryError>
where
    C: Catalog + ?Sized,
    F: FileSystem + ?Sized,
{
    let lookups = fetch_lookups(catalog, options.per_page)?;
    warn_unknown_names(&settings.filter, &lookups);

    let passes = passes(settings);
    let mut fetched = Vec::with_capacity(passes.len());
    for pass in &passes {
        let scenes = match known_selection(&pass.filter.selection_tags, &lookups.tags) {
            Some(tags) => {
                fetch_all_scenes(catalog, &CatalogFilter::with_tags(tags), options.per_page)?
            }
            None => Vec::new(),
        };
        fetched.push(scenes);
    }

    let mut operations = Vec::new();
    let mut planned = HashSet::new();
    for (pass, scenes) in passes.iter().zip(&fetched) {
        for operation in plan(scenes, &pass.filter, &pass.render) {
            if planned.insert(operation.scene_id.clone()) {
                operations.push(operation);
            } else {
                debug!(scene_id = %operation.scene_id, "scene already planned by an earlier rule");
            }
        }
    }

    let duplicates = resolve(&mut operations, fs, options.comparison);
    info!(planned = operations.len(), duplicates, "plan ready");
    Ok(operations)
}

/// Plans and executes a run under `mode`.
///
/// # Examples
///
/// ```
/// use scene_renamer::catalog::JsonCatalog;
/// use scene_renamer::config::RawSettings;
/// use scene_renamer::executor::ExecutionMode;
/// use scene_renamer::filesystem::StdFileSystem;
/// use scene_renamer::pipeline::{RunOptions, run};
///
/// let catalog = JsonCatalog::from_scenes(Vec::new());
/// let settings = RawSettings::default().into_run_settings().unwrap();
///
/// let ledger = run(&catalog, &StdFileSystem, &settings, &RunOptions::default(), &ExecutionMode::DryRun).unwrap();
/// assert!(ledger.is_empty());
/// ```
pub fn run<C, F>(
    catalog: &C,
    fs: &F,
    settings: &RunSettings,
    options: &RunOptions,
    mode: &ExecutionMode,
) -> Result<Ledger, QueryError>
where
    C: Catalog + ?Sized,
    F: FileSystem + ?Sized,
{
    let operations = plan_run(catalog, fs, settings, options)?;
    Ok(Executor::new(fs)
        .jobs(options.jobs)
        .comparison(options.comparison)
        .execute(operations, mode))
}

/// One pass for plain settings, or one per usable tag rule.
fn passes(settings: &RunSettings) -> Vec<Pass> {
    if settings.rules.is_empty() {
        return vec![Pass {
            filter: settings.filter.clone(),
            render: settings.render.clone(),
        }];
    }

    settings
        .rules
        .iter()
        .filter(|rule| {
            let usable = !rule.tag.trim().is_empty() && !rule.template.trim().is_empty();
            if !usable {
                warn!(tag = %rule.tag, template = %rule.template, "skipping incomplete tag rule");
            }
            usable
        })
        .map(|rule| Pass {
            filter: FilterSpec {
                selection_tags: NameSet::from_iter([rule.tag.as_str()]),
                ..settings.filter.clone()
            },
            render: RenderSpec {
                filename_template: rule.template.clone(),
                ..settings.render.clone()
            },
        })
        .collect()
}

/// The selection tags that exist in the catalog. `None` when tags were asked
/// for and none of them exist, meaning the pass selects nothing.
fn known_selection(selection: &NameSet, tags: &NameSet) -> Option<NameSet> {
    if selection.is_empty() {
        return Some(NameSet::new());
    }

    let mut known = NameSet::new();
    for tag in selection {
        if tags.contains(tag) {
            known.insert(tag);
        } else {
            warn!(tag = %tag, "selection tag not found in catalog");
        }
    }

    if known.is_empty() {
        warn!("none of the selection tags exist; nothing to rename");
        return None;
    }
    Some(known)
}

fn warn_unknown_names(filter: &FilterSpec, lookups: &CatalogLookups) {
    let checks = [
        ("studio", &filter.studio_names, &lookups.studios),
        ("group", &filter.group_names, &lookups.groups),
        ("tag", &filter.tag_names, &lookups.tags),
    ];
    for (kind, wanted, known) in checks {
        for name in wanted.iter().filter(|name| !known.contains(name)) {
            warn!(kind, name = %name, "filter name not found in catalog");
        }
    }
}

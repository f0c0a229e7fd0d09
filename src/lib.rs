//! scene-renamer - rename catalogued scene files from metadata templates
//!
//! This library reads scene metadata from a paginated catalog, filters the
//! scenes, renders new file names and directories from templates, rejects
//! colliding destinations, and applies (or previews) the renames while
//! recording every outcome in a ledger.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod error;
pub mod executor;
pub mod filesystem;
pub mod filter;
pub mod ledger;
pub mod name_set;
pub mod output;
pub mod path_builder;
pub mod pipeline;
pub mod planner;
pub mod scene;
pub mod template;

pub use catalog::{Catalog, CatalogLookups, JsonCatalog, QueryError};
pub use config::{ConfigError, RawSettings, RenamerConfig, RunSettings, TagRule};
pub use conflict::PathComparison;
pub use error::{RenameError, RenameResult};
pub use executor::{ExecutionError, ExecutionMode, Executor};
pub use filesystem::{FileSystem, StdFileSystem};
pub use filter::{FilterSpec, TriState};
pub use ledger::{Ledger, OperationRecord, RunPayload};
pub use name_set::NameSet;
pub use pipeline::{RunOptions, plan_run, run};
pub use planner::{OperationStatus, PlannedOperation, PlanningError};
pub use scene::{Gender, Performer, SceneRecord};
pub use template::{RenderSpec, TokenTable};

pub use cli::{RenameCommand, run_cli};

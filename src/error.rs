//! Crate-level errors.
//!
//! Only failures that abort a whole run live here. Problems with a single
//! scene (planning or filesystem failures) are recorded in the ledger instead.

use crate::catalog::QueryError;
use crate::config::ConfigError;
use crate::ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenameError {
    #[error("catalog query failed: {0}")]
    Query(#[from] QueryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type RenameResult<T> = Result<T, RenameError>;

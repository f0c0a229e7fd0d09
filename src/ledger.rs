//! Per-run outcome ledger.
//!
//! The ledger collects every planned operation with its final status, in plan
//! order. It is the only thing a run hands back: the CLI prints it, serializes
//! its [`RunPayload`], and can persist it as a JSON history document.

use crate::executor::ExecutionMode;
use crate::planner::{OperationStatus, PlannedOperation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write ledger to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of one operation as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub scene_id: String,
    pub status: OperationStatus,
    pub old_filename: String,
    pub new_filename: String,
    pub old_path: String,
    pub new_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&PlannedOperation> for OperationRecord {
    fn from(op: &PlannedOperation) -> Self {
        Self {
            scene_id: op.scene_id.clone(),
            status: op.status,
            old_filename: op.old_filename.clone(),
            new_filename: op.new_filename.clone(),
            old_path: op.old_path.to_string_lossy().into_owned(),
            new_path: op.new_path.to_string_lossy().into_owned(),
            error: op.error.clone(),
        }
    }
}

/// The structured result of a run: `{ "operations": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPayload {
    pub operations: Vec<OperationRecord>,
}

#[derive(Serialize)]
struct LedgerDocument {
    started_at: String,
    finished_at: Option<String>,
    mode: &'static str,
    #[serde(flatten)]
    payload: RunPayload,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    mode: ExecutionMode,
    operations: Vec<PlannedOperation>,
}

impl Ledger {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            mode,
            operations: Vec::new(),
        }
    }

    pub fn push(&mut self, operation: PlannedOperation) {
        self.operations.push(operation);
    }

    pub fn extend(&mut self, operations: impl IntoIterator<Item = PlannedOperation>) {
        self.operations.extend(operations);
    }

    /// Stamps the finish time. Calling it again keeps the first stamp.
    pub fn finish(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn mode(&self) -> &ExecutionMode {
        &self.mode
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn operations(&self) -> &[PlannedOperation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<PlannedOperation> {
        self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn count(&self, status: OperationStatus) -> usize {
        self.operations.iter().filter(|op| op.status == status).count()
    }

    /// Operation counts keyed by status name, for display.
    pub fn summary(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for op in &self.operations {
            *counts.entry(op.status.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// True when no operation ended in `error`.
    pub fn is_clean(&self) -> bool {
        self.count(OperationStatus::Error) == 0
    }

    pub fn payload(&self) -> RunPayload {
        RunPayload {
            operations: self.operations.iter().map(OperationRecord::from).collect(),
        }
    }

    /// Writes the ledger as a pretty-printed JSON history document.
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let document = LedgerDocument {
            started_at: self.started_at.to_rfc3339(),
            finished_at: self.finished_at.map(|t| t.to_rfc3339()),
            mode: self.mode.label(),
            payload: self.payload(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| LedgerError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| LedgerError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

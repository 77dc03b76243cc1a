pub mod classify;
pub mod dedup;
pub mod engine;
pub mod remediate;
pub mod translate;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::lookup::UnknownLookupKey;
use crate::providers::ApiError;

pub use engine::Migrator;

#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    /// Restrict the run to these source keys.
    pub specific_issues: Option<Vec<String>>,
    /// Trust target items that already exist instead of re-syncing them.
    pub skip_updates: bool,
    /// Populate the responsible reference from the issue creator.
    pub map_responsible: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.created + self.updated
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    /// Source issue key -> target work item id.
    pub index: BTreeMap<String, u64>,
    pub summary: RunSummary,
}

/// Why a single issue could not be migrated.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error(transparent)]
    Lookup(#[from] UnknownLookupKey),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Source(#[from] anyhow::Error),
    #[error("temporary file error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    pub fn response_body(&self) -> Option<&Value> {
        match self {
            MigrateError::Api(e) => e.body(),
            _ => None,
        }
    }
}

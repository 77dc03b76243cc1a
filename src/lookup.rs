use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Type,
    Status,
    Priority,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LookupKind::Type => "type",
            LookupKind::Status => "status",
            LookupKind::Priority => "priority",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no target {kind} matches {name:?}")]
pub struct UnknownLookupKey {
    pub kind: LookupKind,
    pub name: String,
}

/// Resolves source field values to target ids.
pub trait Lookups: Send + Sync {
    fn type_id(&self, name: &str) -> Result<u64, UnknownLookupKey>;
    fn status_id(&self, name: &str) -> Result<u64, UnknownLookupKey>;
    fn priority_id(&self, name: &str) -> Result<u64, UnknownLookupKey>;
}

/// One name -> id table, matched case-insensitively, with optional aliases
/// translating a source name into a differently named target entry.
#[derive(Debug, Clone, Default)]
pub struct Table {
    ids: HashMap<String, u64>,
    aliases: HashMap<String, String>,
}

impl Table {
    pub fn new(catalog: impl IntoIterator<Item = (String, u64)>) -> Self {
        Self {
            ids: catalog
                .into_iter()
                .map(|(name, id)| (name.to_lowercase(), id))
                .collect(),
            aliases: HashMap::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &HashMap<String, String>) -> Self {
        self.aliases = aliases
            .iter()
            .map(|(from, to)| (from.to_lowercase(), to.to_lowercase()))
            .collect();
        self
    }

    fn resolve(&self, kind: LookupKind, name: &str) -> Result<u64, UnknownLookupKey> {
        let key = name.to_lowercase();
        let key = self.aliases.get(&key).unwrap_or(&key);
        self.ids.get(key).copied().ok_or_else(|| UnknownLookupKey {
            kind,
            name: name.to_string(),
        })
    }
}

/// Lookup tables loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub types: Table,
    pub statuses: Table,
    pub priorities: Table,
}

impl Lookups for LookupTables {
    fn type_id(&self, name: &str) -> Result<u64, UnknownLookupKey> {
        self.types.resolve(LookupKind::Type, name)
    }

    fn status_id(&self, name: &str) -> Result<u64, UnknownLookupKey> {
        self.statuses.resolve(LookupKind::Status, name)
    }

    fn priority_id(&self, name: &str) -> Result<u64, UnknownLookupKey> {
        self.priorities.resolve(LookupKind::Priority, name)
    }
}

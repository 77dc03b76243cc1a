use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Precomputed mapping from source account ids to target user ids.
///
/// Read-only for the duration of a run. A missing entry means the user has
/// no counterpart on the target, which is not an error.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    users: HashMap<String, u64>,
}

impl IdentityMap {
    /// Load a JSON object of `{"<account id>": <user id>}`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read identity map from {}", path.display()))?;
        let users: HashMap<String, u64> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse identity map {}", path.display()))?;
        Ok(Self { users })
    }

    pub fn resolve(&self, account_id: &str) -> Option<u64> {
        self.users.get(account_id).copied()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }
}

impl FromIterator<(String, u64)> for IdentityMap {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            users: iter.into_iter().collect(),
        }
    }
}

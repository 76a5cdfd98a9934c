//! Wire-level types reported by the automation backend.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// A file the backend reports as assigned, with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedFile {
    pub filename: String,
    /// Owner reported by the backend (the adbot id as a string).
    pub user_id: String,
}

/// Backend listing partitioned by physical location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalListing {
    #[serde(default)]
    pub unused: Vec<String>,
    #[serde(default)]
    pub assigned: Vec<AssignedFile>,
    #[serde(default)]
    pub banned: Vec<String>,
    #[serde(default)]
    pub frozen: Vec<String>,
}

/// Where a file lives according to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalLocation {
    Unused,
    Assigned { owner: String },
    Banned,
    Frozen,
}

impl ExternalListing {
    /// Index every file by name. Later partitions win if a name is listed twice.
    pub fn index(&self) -> HashMap<&str, ExternalLocation> {
        let mut map = HashMap::new();
        for name in &self.unused {
            map.insert(name.as_str(), ExternalLocation::Unused);
        }
        for file in &self.assigned {
            map.insert(
                file.filename.as_str(),
                ExternalLocation::Assigned {
                    owner: file.user_id.clone(),
                },
            );
        }
        for name in &self.banned {
            map.insert(name.as_str(), ExternalLocation::Banned);
        }
        for name in &self.frozen {
            map.insert(name.as_str(), ExternalLocation::Frozen);
        }
        map
    }

    /// Every distinct file name in the listing.
    pub fn all_names(&self) -> HashSet<&str> {
        self.unused
            .iter()
            .map(String::as_str)
            .chain(self.assigned.iter().map(|a| a.filename.as_str()))
            .chain(self.banned.iter().map(String::as_str))
            .chain(self.frozen.iter().map(String::as_str))
            .collect()
    }

    /// Count of files in a partition: (unused, assigned, banned, frozen).
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.unused.len(),
            self.assigned.len(),
            self.banned.len(),
            self.frozen.len(),
        )
    }
}

/// Result of a verify request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub valid: bool,
    pub exists: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

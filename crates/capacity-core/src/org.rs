//! Organization directory
//!
//! Tribe -> squad -> approver lookups backing the metadata form cascade.

use crate::error::{CapacityError, Result};
use crate::tags::PresentationAdapter;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const UNKNOWN_APPROVER: &str = "Unknown Approver";

pub const TRIBE_FIELD: &str = "tribe";
pub const SQUAD_FIELD: &str = "squad";
pub const APPROVER_FIELD: &str = "approver";

/// One approver and the tribes (with their squads) it covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgEntry {
    pub tribes: IndexMap<String, Vec<String>>,
    pub approver: String,
}

impl OrgEntry {
    fn new(approver: &str, tribes: &[(&str, &[&str])]) -> Self {
        Self {
            tribes: tribes
                .iter()
                .map(|(tribe, squads)| {
                    (
                        tribe.to_string(),
                        squads.iter().map(|squad| squad.to_string()).collect(),
                    )
                })
                .collect(),
            approver: approver.to_string(),
        }
    }

    pub fn has_squad(&self, tribe: &str, squad: &str) -> bool {
        self.tribes
            .get(tribe)
            .is_some_and(|squads| squads.iter().any(|s| s == squad))
    }
}

/// Where the directory came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorySource {
    File(PathBuf),
    Builtin,
}

impl DirectorySource {
    pub fn label(&self) -> &'static str {
        match self {
            DirectorySource::File(_) => "file",
            DirectorySource::Builtin => "builtin",
        }
    }
}

/// Ordered directory entries; the first entry containing a tribe wins
#[derive(Debug, Clone)]
pub struct OrganizationDirectory {
    entries: Vec<OrgEntry>,
    source: DirectorySource,
}

impl OrganizationDirectory {
    pub fn from_entries(entries: Vec<OrgEntry>, source: DirectorySource) -> Self {
        Self { entries, source }
    }

    /// Load the JSON array document at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let entries: Vec<OrgEntry> = serde_json::from_str(&content)?;

        debug!(path = %path.display(), entries = entries.len(), "Loaded organization directory");
        Ok(Self::from_entries(entries, DirectorySource::File(path.to_path_buf())))
    }

    /// Load from `path`, or fall back to the built-in directory
    pub fn load_or_builtin(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(directory) => directory,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load organization directory, using built-in directory"
                );
                Self::builtin()
            }
        }
    }

    pub fn builtin() -> Self {
        Self::from_entries(
            vec![
                OrgEntry::new(
                    "Abi Baltazar",
                    &[("funds", &["bank_cashin", "bank_transfer", "p2p_and_padala"])],
                ),
                OrgEntry::new(
                    "Platform Lead",
                    &[("platform", &["infrastructure", "security", "monitoring"])],
                ),
            ],
            DirectorySource::Builtin,
        )
    }

    pub fn entries(&self) -> &[OrgEntry] {
        &self.entries
    }

    pub fn source(&self) -> &DirectorySource {
        &self.source
    }

    pub fn is_builtin(&self) -> bool {
        self.source == DirectorySource::Builtin
    }

    /// All tribe names, first occurrence order
    pub fn tribes(&self) -> Vec<&str> {
        let mut tribes: Vec<&str> = Vec::new();
        for tribe in self.entries.iter().flat_map(|entry| entry.tribes.keys()) {
            if !tribes.contains(&tribe.as_str()) {
                tribes.push(tribe);
            }
        }
        tribes
    }

    pub fn entry_for_tribe(&self, tribe: &str) -> Option<&OrgEntry> {
        self.entries
            .iter()
            .find(|entry| entry.tribes.contains_key(tribe))
    }

    pub fn squads(&self, tribe: &str) -> Vec<String> {
        self.entry_for_tribe(tribe)
            .and_then(|entry| entry.tribes.get(tribe))
            .cloned()
            .unwrap_or_default()
    }

    /// Approver for a tribe, or `Unknown Approver`
    pub fn find_approver(&self, tribe: &str) -> &str {
        self.entry_for_tribe(tribe)
            .map(|entry| entry.approver.as_str())
            .unwrap_or(UNKNOWN_APPROVER)
    }

    pub fn approver_for_squad(&self, tribe: &str, squad: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.has_squad(tribe, squad))
            .map(|entry| entry.approver.as_str())
    }

    /// Tribe selection: resets the squad, fills the approver, returns the squad options
    ///
    /// An unknown tribe yields no squads and leaves the approver as it was.
    pub fn select_tribe(
        &self,
        tribe: &str,
        adapter: &mut dyn PresentationAdapter,
    ) -> Result<Vec<String>> {
        adapter.write_field(TRIBE_FIELD, tribe.to_string())?;
        adapter.write_field(SQUAD_FIELD, String::new())?;

        let Some(entry) = self.entry_for_tribe(tribe) else {
            debug!(tribe = %tribe, "No directory entry for tribe");
            return Ok(Vec::new());
        };

        adapter.write_field(APPROVER_FIELD, entry.approver.clone())?;
        Ok(entry.tribes.get(tribe).cloned().unwrap_or_default())
    }

    /// Squad selection: re-resolves the approver by (tribe, squad)
    pub fn select_squad(&self, squad: &str, adapter: &mut dyn PresentationAdapter) -> Result<()> {
        let tribe = adapter.read_field(TRIBE_FIELD).unwrap_or_default();
        if tribe.trim().is_empty() {
            return Err(CapacityError::InvalidInput(
                "Select a tribe before selecting a squad".to_string(),
            ));
        }

        adapter.write_field(SQUAD_FIELD, squad.to_string())?;
        if let Some(approver) = self.approver_for_squad(&tribe, squad) {
            adapter.write_field(APPROVER_FIELD, approver.to_string())?;
        }
        Ok(())
    }
}

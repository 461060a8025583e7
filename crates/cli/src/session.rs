//! Persistent CLI session
//!
//! Holds the namespace result set, the metadata form, the squad options of
//! the selected tribe and the last accepted finalize summary between
//! invocations.

use anyhow::{Context, Result};
use capacity_core::{FieldMap, FinalizedSummary, ResultSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub results: ResultSet,
    #[serde(default)]
    pub form: FieldMap,
    #[serde(default)]
    pub squad_options: Vec<String>,
    /// Replaced by every finalize run, read by tag display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accepted: Option<FinalizedSummary>,
}

impl Session {
    /// Load the session, starting empty when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No session file, starting empty");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read session file")?;
        serde_json::from_str(&content).context("Failed to parse session file")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize session")?;
        std::fs::write(path, content).context("Failed to write session file")?;

        debug!(path = %path.display(), records = self.results.len(), "Saved session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capacity_core::NamespaceRequest;

    #[test]
    fn test_missing_session_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::load(&dir.path().join("session.json")).unwrap();

        assert!(session.results.is_empty());
        assert!(session.form.is_empty());
    }

    #[test]
    fn test_ids_continue_across_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut session = Session::default();
        session.results.add(NamespaceRequest::new("prod", "eks", "a"));
        session.results.add(NamespaceRequest::new("prod", "eks", "b"));
        session.form.set("tribe", "funds");
        session.squad_options = vec!["bank_cashin".to_string()];
        session.save(&path).unwrap();

        let mut restored = Session::load(&path).unwrap();
        let id = restored.results.add(NamespaceRequest::new("dev", "eks", "c")).id;

        assert_eq!(id, 3);
        assert_eq!(restored.form.get("tribe"), Some("funds"));
        assert_eq!(restored.squad_options, vec!["bank_cashin"]);
        assert!(restored.last_accepted.is_none());
    }

    #[test]
    fn test_last_accepted_summary_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut request = NamespaceRequest::new("prod", "eks", "a");
        request.monthly_cost = 950.0;
        let mut session = Session::default();
        session.last_accepted = Some(FinalizedSummary::from_records(&[request]));
        session.save(&path).unwrap();

        let restored = Session::load(&path).unwrap();
        assert_eq!(restored.last_accepted, session.last_accepted);
    }

    #[test]
    fn test_corrupt_session_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ nope").unwrap();

        assert!(Session::load(&path).is_err());
    }
}

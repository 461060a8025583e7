//! Subcommand implementations

pub mod finalize;
pub mod meta;
pub mod namespaces;
pub mod org;
pub mod summary;

use crate::output::OutputFormat;
use crate::session::Session;
use anyhow::Result;
use capacity_core::OrganizationDirectory;
use std::path::PathBuf;
use std::time::Duration;

/// Resolved settings plus the loaded session for one invocation
pub struct AppContext {
    pub api_url: String,
    pub timeout: Duration,
    pub org_mapping: Option<PathBuf>,
    pub format: OutputFormat,
    pub session_path: PathBuf,
    pub session: Session,
}

impl AppContext {
    pub fn save(&self) -> Result<()> {
        self.session.save(&self.session_path)
    }

    /// Configured directory, or the built-in one
    pub fn directory(&self) -> OrganizationDirectory {
        match &self.org_mapping {
            Some(path) => OrganizationDirectory::load_or_builtin(path),
            None => OrganizationDirectory::builtin(),
        }
    }
}

//! Metadata tag mirroring
//!
//! Copies organizational form fields into their display tags, applying a
//! per-field formatting rule, and renders the cost estimate tag. Core logic
//! never touches a display directly; everything goes through a
//! [`PresentationAdapter`].

use crate::error::{CapacityError, Result};
use crate::finalize::{format_currency, FinalizedSummary};
use crate::results::ResultSet;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

pub const NOT_SPECIFIED: &str = "Not specified";
pub const NOT_SELECTED: &str = "Not selected";

/// Display target of the cost estimate
pub const COST_ESTIMATE_TAG: &str = "tagCostEstimates";

pub const TARGET_DATE_FIELD: &str = "targetDate";
pub const DURATION_FIELD: &str = "duration";

/// Form field -> tag display field
pub const TAG_MAPPING: &[(&str, &str)] = &[
    ("tribe", "tagTribe"),
    ("squad", "tagSquad"),
    ("approver", "tagApprover"),
    ("platform", "tagPlatform"),
    ("productOwner", "tagPO"),
    ("systemOwner", "tagSO"),
    ("srTag", "tagSR"),
    ("description", "tagDesc"),
    (TARGET_DATE_FIELD, "tagFireupDate"),
    (DURATION_FIELD, "tagDuration"),
];

/// Form field -> request information display field
pub const REQUEST_INFO_MAPPING: &[(&str, &str)] = &[
    ("requestForm", "tagRequestForm"),
    ("mtsId", "tagMtsId"),
    ("projectCode", "tagProject"),
    ("metaEnv", "tagEnvironment"),
    ("envGroup", "tagEnvGroup"),
    (TARGET_DATE_FIELD, "tagRequestFireupDate"),
    (DURATION_FIELD, "tagRequestDuration"),
];

/// Boundary between core outputs and whatever renders them
pub trait PresentationAdapter {
    fn read_field(&self, id: &str) -> Option<String>;

    /// Fails with [`CapacityError::MissingDisplayTarget`] when `id` cannot be shown
    fn write_field(&mut self, id: &str, value: String) -> Result<()>;
}

/// Formatting rules differ slightly between the tag list and the
/// request information block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagContext {
    /// Empty values read `Not specified`
    Generic,
    /// Empty target date reads `Not selected`; duration gets a `months` suffix
    Metadata,
}

/// In-memory field store
///
/// With no declared targets every write succeeds; with declared targets,
/// writes to anything else report a missing display target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMap {
    values: BTreeMap<String, String>,
    #[serde(skip)]
    targets: Option<BTreeSet<String>>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: BTreeMap::new(),
            targets: Some(targets.into_iter().map(Into::into).collect()),
        }
    }

    pub fn set(&mut self, id: impl Into<String>, value: impl Into<String>) {
        self.values.insert(id.into(), value.into());
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    pub fn remove(&mut self, id: &str) -> Option<String> {
        self.values.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PresentationAdapter for FieldMap {
    fn read_field(&self, id: &str) -> Option<String> {
        self.values.get(id).cloned()
    }

    fn write_field(&mut self, id: &str, value: String) -> Result<()> {
        if let Some(targets) = &self.targets {
            if !targets.contains(id) {
                return Err(CapacityError::MissingDisplayTarget(id.to_string()));
            }
        }
        self.values.insert(id.to_string(), value);
        Ok(())
    }
}

/// en-US `MM/DD/YYYY`; unparseable input is shown unchanged
pub fn format_date(value: &str) -> String {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.format("%m/%d/%Y").to_string();
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return datetime.format("%m/%d/%Y").to_string();
    }
    value.to_string()
}

/// Display text for a form value under the given context
pub fn format_value(field_id: &str, raw: Option<&str>, context: TagContext) -> String {
    let value = raw.map(str::trim).unwrap_or_default();

    match (field_id, context) {
        (TARGET_DATE_FIELD, _) if !value.is_empty() => format_date(value),
        (TARGET_DATE_FIELD, TagContext::Metadata) => NOT_SELECTED.to_string(),
        (DURATION_FIELD, TagContext::Metadata) if !value.is_empty() => format!("{} months", value),
        _ if value.is_empty() => NOT_SPECIFIED.to_string(),
        _ => value.to_string(),
    }
}

fn lookup(mapping: &[(&str, &'static str)], field_id: &str) -> Option<&'static str> {
    mapping
        .iter()
        .find(|(form_id, _)| *form_id == field_id)
        .map(|(_, tag_id)| *tag_id)
}

/// Mirror one form field into its tag (generic context)
///
/// Returns `Ok(false)` for fields without a tag.
pub fn sync_field(adapter: &mut dyn PresentationAdapter, field_id: &str) -> Result<bool> {
    sync_field_in(adapter, field_id, TagContext::Generic)
}

pub fn sync_field_in(
    adapter: &mut dyn PresentationAdapter,
    field_id: &str,
    context: TagContext,
) -> Result<bool> {
    let mapping = match context {
        TagContext::Generic => TAG_MAPPING,
        TagContext::Metadata => REQUEST_INFO_MAPPING,
    };
    let Some(tag_id) = lookup(mapping, field_id) else {
        return Ok(false);
    };

    let value = format_value(field_id, adapter.read_field(field_id).as_deref(), context);
    debug!(tag = tag_id, value = %value, "Updated tag");
    adapter.write_field(tag_id, value)?;
    Ok(true)
}

/// Cost estimate text, preferring the last accepted summary
pub fn cost_estimate_text(last_accepted: Option<&FinalizedSummary>, results: &ResultSet) -> String {
    let (monthly, annual) = match last_accepted {
        Some(summary) => (summary.raw_total_monthly, summary.annual_or_derived()),
        None => (results.total_monthly(), results.total_annual()),
    };
    format!(
        "{}/monthly | {}/yearly",
        format_currency(monthly),
        format_currency(annual)
    )
}

pub fn sync_cost_estimate(
    adapter: &mut dyn PresentationAdapter,
    last_accepted: Option<&FinalizedSummary>,
    results: &ResultSet,
) -> Result<()> {
    adapter.write_field(COST_ESTIMATE_TAG, cost_estimate_text(last_accepted, results))
}

/// Sync every tag and the cost estimate
///
/// Missing display targets are logged and skipped; their ids are returned.
pub fn sync_all(
    adapter: &mut dyn PresentationAdapter,
    last_accepted: Option<&FinalizedSummary>,
    results: &ResultSet,
) -> Vec<String> {
    let mut missing = Vec::new();

    if let Err(e) = sync_cost_estimate(adapter, last_accepted, results) {
        record_missing(e, &mut missing);
    }
    for (field_id, _) in TAG_MAPPING {
        if let Err(e) = sync_field(adapter, field_id) {
            record_missing(e, &mut missing);
        }
    }

    missing
}

/// Sync the request information block (metadata context)
pub fn sync_request_information(adapter: &mut dyn PresentationAdapter) -> Vec<String> {
    let mut missing = Vec::new();
    for (field_id, _) in REQUEST_INFO_MAPPING {
        if let Err(e) = sync_field_in(adapter, field_id, TagContext::Metadata) {
            record_missing(e, &mut missing);
        }
    }
    missing
}

fn record_missing(error: CapacityError, missing: &mut Vec<String>) {
    warn!(error = %error, "Tag not rendered");
    if let CapacityError::MissingDisplayTarget(id) = error {
        missing.push(id);
    }
}

//! Core library for namespace capacity cost estimation
//!
//! This crate provides the core functionality for:
//! - Tracking namespace requests and their derived costs
//! - Grouping namespaces by environment with infra sizing
//! - Reconciling finalized costs against a remote cost service
//! - Mirroring organizational metadata into display tags
//! - Health checks and observability

pub mod error;
pub mod finalize;
pub mod formula;
pub mod health;
pub mod models;
pub mod observability;
pub mod org;
pub mod results;
pub mod summary;
pub mod tags;
pub mod validation;

pub use error::{CapacityError, Result};
pub use finalize::{
    CostService, FallbackReason, FinalizationReconciler, Finalization, FinalizeResponse,
    FinalizedGroup, FinalizedSummary, SummarySource,
};
pub use formula::{CostEstimate, CostFormula, TierPricing};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{CapacityMetrics, StructuredLogger};
pub use org::{DirectorySource, OrgEntry, OrganizationDirectory};
pub use results::ResultSet;
pub use summary::{EnvironmentGroup, Grouping, GroupingMode, Totals};
pub use tags::{FieldMap, PresentationAdapter, TagContext};

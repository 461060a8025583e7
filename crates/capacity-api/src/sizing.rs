//! Authoritative finalize breakdown computed by the service
//!
//! Sizing here deliberately differs from the client fallback: the buffer is
//! rounded up and prod nodes are packed at 2.29 cores instead of 2.67.

use capacity_core::finalize::{format_currency, FinalizeResponse, FinalizedGroup};
use capacity_core::formula::MONTHS_PER_YEAR;
use capacity_core::summary::{CPU_BUFFER_FACTOR, NONPROD_CPU_PER_NAMESPACE, PROD_CPU_PER_NAMESPACE};
use capacity_core::{NamespaceRequest, OrganizationDirectory, PROD_ENV};
use indexmap::IndexMap;

/// Usable cores per prod node
pub const PROD_NODE_CAPACITY: f64 = 2.29;

/// Usable cores per non-prod node
pub const NONPROD_NODE_CAPACITY: f64 = 2.0;

pub const DEFAULT_PDB: &str = "minUnavailable = 1";
pub const DEFAULT_EKS_VERSION: &str = "v1.32";

/// Approver shown when the first namespace of a group has no tribe
pub const NO_TRIBE_APPROVER: &str = "Unknown";

pub fn cpu_per_namespace(env: &str) -> u32 {
    if env == PROD_ENV {
        PROD_CPU_PER_NAMESPACE
    } else {
        NONPROD_CPU_PER_NAMESPACE
    }
}

/// ceil(total_cpu * 1.3)
pub fn buffered_cpu(total_cpu: u64) -> u64 {
    (total_cpu as f64 * CPU_BUFFER_FACTOR).ceil() as u64
}

pub fn node_count(env: &str, total_cpu_buffered: u64) -> u64 {
    let capacity = if env == PROD_ENV {
        PROD_NODE_CAPACITY
    } else {
        NONPROD_NODE_CAPACITY
    };
    (total_cpu_buffered as f64 / capacity).ceil() as u64
}

/// Group by environment and size each group
///
/// The caller rejects empty input before calling this.
pub fn breakdown(
    records: &[NamespaceRequest],
    directory: &OrganizationDirectory,
) -> FinalizeResponse {
    let mut by_env: IndexMap<&str, Vec<&NamespaceRequest>> = IndexMap::new();
    for record in records {
        by_env.entry(record.env.as_str()).or_default().push(record);
    }

    let finalized_costs: IndexMap<String, FinalizedGroup> = by_env
        .into_iter()
        .map(|(env, entries)| (env.to_string(), size_group(env, &entries, directory)))
        .collect();

    let total_monthly: f64 = finalized_costs.values().map(|group| group.raw_monthly).sum();
    let total_annual = total_monthly * MONTHS_PER_YEAR;

    FinalizeResponse {
        success: true,
        finalized_costs: Some(finalized_costs),
        raw_total_monthly: Some(total_monthly),
        raw_total_annual: Some(total_annual),
        total_monthly_cost: Some(format_currency(total_monthly)),
        total_annual_cost: Some(format_currency(total_annual)),
        error: None,
    }
}

fn size_group(
    env: &str,
    entries: &[&NamespaceRequest],
    directory: &OrganizationDirectory,
) -> FinalizedGroup {
    let namespace_count = entries.len() as u32;
    let raw_monthly: f64 = entries.iter().map(|entry| entry.monthly_cost).sum();
    let raw_annual: f64 = entries.iter().map(|entry| entry.annual_cost).sum();

    let total_cpu = namespace_count as u64 * cpu_per_namespace(env) as u64;
    let total_cpu_buffered = buffered_cpu(total_cpu);

    let first = entries.first();
    let tribe_approver = match first.and_then(|entry| entry.tribe.as_deref()) {
        Some(tribe) if !tribe.is_empty() => directory.find_approver(tribe).to_string(),
        _ => NO_TRIBE_APPROVER.to_string(),
    };

    FinalizedGroup {
        cluster_name: first
            .map(|entry| entry.cluster.clone())
            .unwrap_or_default(),
        provisioner: first
            .map(|entry| entry.provisioner_label().to_string())
            .unwrap_or_default(),
        namespace_count,
        total_cpu,
        total_cpu_buffered,
        node_count: node_count(env, total_cpu_buffered),
        raw_monthly,
        raw_annual,
        monthly_cost: format_currency(raw_monthly),
        annual_cost: format_currency(raw_annual),
        pdb: Some(
            first
                .and_then(|entry| entry.pdb.clone())
                .unwrap_or_else(|| DEFAULT_PDB.to_string()),
        ),
        eks_version: Some(
            first
                .and_then(|entry| entry.eks_version.clone())
                .unwrap_or_else(|| DEFAULT_EKS_VERSION.to_string()),
        ),
        tribe_approver: Some(tribe_approver),
    }
}

//! Environment aggregation and infra sizing
//!
//! Groups namespace requests by environment (or environment and cluster),
//! sums their costs and derives buffered CPU and node counts per group.

use crate::models::NamespaceRequest;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// CPU cores assumed per production namespace without an explicit footprint
pub const PROD_CPU_PER_NAMESPACE: u32 = 128;

/// CPU cores assumed per non-production namespace without an explicit footprint
pub const NONPROD_CPU_PER_NAMESPACE: u32 = 6;

/// Headroom applied to the summed CPU (30%)
pub const CPU_BUFFER_FACTOR: f64 = 1.3;

/// Usable cores per node
pub const NODE_CAPACITY_CORES: f64 = 2.67;

/// Relative tolerance when comparing independently summed totals
const TOTALS_EPSILON: f64 = 1e-6;

/// Key granularity for grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingMode {
    /// One group per environment name
    #[default]
    Environment,
    /// One group per `{env}-{cluster}` pair
    EnvironmentCluster,
}

impl GroupingMode {
    pub fn key_for(&self, request: &NamespaceRequest) -> String {
        match self {
            GroupingMode::Environment => request.env.clone(),
            GroupingMode::EnvironmentCluster => format!("{}-{}", request.env, request.cluster),
        }
    }
}

/// CPU footprint of one namespace in cores
pub fn namespace_cpu(request: &NamespaceRequest) -> u32 {
    request.cpu_core_ns.unwrap_or(if request.is_prod() {
        PROD_CPU_PER_NAMESPACE
    } else {
        NONPROD_CPU_PER_NAMESPACE
    })
}

/// round(total_cpu * 1.3)
pub fn buffered_cpu(total_cpu: u64) -> u64 {
    (total_cpu as f64 * CPU_BUFFER_FACTOR).round() as u64
}

/// ceil(total_cpu_buffered / 2.67)
pub fn node_count(total_cpu_buffered: u64) -> u64 {
    (total_cpu_buffered as f64 / NODE_CAPACITY_CORES).ceil() as u64
}

/// Aggregate over all namespaces sharing a grouping key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentGroup {
    pub env: String,
    /// Cluster of the first namespace in the group
    pub cluster_name: String,
    pub provisioner: String,
    pub namespace_count: u32,
    pub total_cpu: u64,
    pub total_cpu_buffered: u64,
    pub node_count: u64,
    pub raw_monthly: f64,
    pub raw_annual: f64,
}

impl EnvironmentGroup {
    fn seeded_from(request: &NamespaceRequest) -> Self {
        Self {
            env: request.env.clone(),
            cluster_name: request.cluster.clone(),
            provisioner: request.provisioner_label().to_string(),
            namespace_count: 0,
            total_cpu: 0,
            total_cpu_buffered: 0,
            node_count: 0,
            raw_monthly: 0.0,
            raw_annual: 0.0,
        }
    }

    fn accumulate(&mut self, request: &NamespaceRequest) {
        self.namespace_count += 1;
        self.total_cpu += namespace_cpu(request) as u64;
        self.raw_monthly += request.monthly_cost;
        self.raw_annual += request.annual_cost;
    }

    fn derive_sizing(&mut self) {
        self.total_cpu_buffered = buffered_cpu(self.total_cpu);
        self.node_count = node_count(self.total_cpu_buffered);
    }
}

/// Insertion-ordered groups keyed by the grouping mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    pub mode: GroupingMode,
    pub groups: IndexMap<String, EnvironmentGroup>,
}

impl Grouping {
    pub fn get(&self, key: &str) -> Option<&EnvironmentGroup> {
        self.groups.get(key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of group monthly totals
    pub fn monthly_sum(&self) -> f64 {
        self.groups.values().map(|group| group.raw_monthly).sum()
    }

    pub fn annual_sum(&self) -> f64 {
        self.groups.values().map(|group| group.raw_annual).sum()
    }
}

/// Group records in insertion order
pub fn group(records: &[NamespaceRequest], mode: GroupingMode) -> Grouping {
    let mut groups: IndexMap<String, EnvironmentGroup> = IndexMap::new();

    for record in records {
        groups
            .entry(mode.key_for(record))
            .or_insert_with(|| EnvironmentGroup::seeded_from(record))
            .accumulate(record);
    }

    for group in groups.values_mut() {
        group.derive_sizing();
    }

    Grouping { mode, groups }
}

/// Grand totals computed directly over the ungrouped records
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub namespace_count: usize,
    pub raw_monthly: f64,
    pub raw_annual: f64,
}

impl Totals {
    pub fn from_records(records: &[NamespaceRequest]) -> Self {
        Self {
            namespace_count: records.len(),
            raw_monthly: records.iter().map(|record| record.monthly_cost).sum(),
            raw_annual: records.iter().map(|record| record.annual_cost).sum(),
        }
    }

    pub fn average_monthly(&self) -> f64 {
        if self.namespace_count == 0 {
            0.0
        } else {
            self.raw_monthly / self.namespace_count as f64
        }
    }

    /// Whether a grouping's sums agree with these totals
    pub fn matches(&self, grouping: &Grouping) -> bool {
        let count: usize = grouping
            .groups
            .values()
            .map(|group| group.namespace_count as usize)
            .sum();

        count == self.namespace_count
            && approx_eq(grouping.monthly_sum(), self.raw_monthly)
            && approx_eq(grouping.annual_sum(), self.raw_annual)
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= TOTALS_EPSILON * scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_PROVISIONER;

    fn record(env: &str, cluster: &str, monthly: f64) -> NamespaceRequest {
        let mut request = NamespaceRequest::new(env, cluster, format!("{}-ns", env));
        request.monthly_cost = monthly;
        request.annual_cost = monthly * 12.0;
        request
    }

    #[test]
    fn test_groups_by_environment() {
        let records = vec![
            record("prod", "eks-prod", 100.0),
            record("prod", "eks-prod", 50.0),
            record("dev", "eks-dev", 10.0),
        ];

        let grouping = group(&records, GroupingMode::Environment);
        let totals = Totals::from_records(&records);

        assert_eq!(grouping.len(), 2);
        assert_eq!(grouping.get("prod").unwrap().raw_monthly, 150.0);
        assert_eq!(grouping.get("dev").unwrap().raw_monthly, 10.0);
        assert_eq!(totals.raw_monthly, 160.0);
        assert!(totals.matches(&grouping));
    }

    #[test]
    fn test_groups_keep_insertion_order() {
        let records = vec![
            record("staging", "a", 1.0),
            record("prod", "b", 1.0),
            record("dev", "c", 1.0),
            record("prod", "b", 1.0),
        ];

        let grouping = group(&records, GroupingMode::Environment);
        let keys: Vec<&str> = grouping.groups.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["staging", "prod", "dev"]);
    }

    #[test]
    fn test_environment_cluster_mode_splits_clusters() {
        let records = vec![
            record("prod", "eks-a", 1.0),
            record("prod", "eks-b", 2.0),
            record("prod", "eks-a", 3.0),
        ];

        let grouping = group(&records, GroupingMode::EnvironmentCluster);
        assert_eq!(grouping.len(), 2);
        assert_eq!(grouping.get("prod-eks-a").unwrap().namespace_count, 2);
        assert_eq!(grouping.get("prod-eks-a").unwrap().raw_monthly, 4.0);
        assert_eq!(grouping.get("prod-eks-b").unwrap().cluster_name, "eks-b");

        let by_env = group(&records, GroupingMode::Environment);
        assert_eq!(by_env.len(), 1);
        assert_eq!(by_env.get("prod").unwrap().cluster_name, "eks-a");
    }

    #[test]
    fn test_default_cpu_footprint() {
        let records = vec![
            record("prod", "a", 0.0),
            record("prod", "a", 0.0),
            record("dev", "b", 0.0),
        ];

        let grouping = group(&records, GroupingMode::Environment);
        assert_eq!(grouping.get("prod").unwrap().total_cpu, 256);
        assert_eq!(grouping.get("dev").unwrap().total_cpu, 6);
    }

    #[test]
    fn test_explicit_cpu_footprint_wins() {
        let mut a = record("prod", "a", 0.0);
        a.cpu_core_ns = Some(60);
        let mut b = record("prod", "a", 0.0);
        b.cpu_core_ns = Some(40);

        let grouping = group(&[a, b], GroupingMode::Environment);
        let prod = grouping.get("prod").unwrap();
        assert_eq!(prod.total_cpu, 100);
        assert_eq!(prod.total_cpu_buffered, 130);
        assert_eq!(prod.node_count, 49);
    }

    #[test]
    fn test_sizing_formulas() {
        assert_eq!(buffered_cpu(100), 130);
        assert_eq!(node_count(130), 49);

        // 6 cores -> 7.8 -> 8 buffered -> ceil(2.996) = 3 nodes
        assert_eq!(buffered_cpu(6), 8);
        assert_eq!(node_count(8), 3);

        // 128 cores -> 166.4 -> 166 -> ceil(62.17) = 63 nodes
        assert_eq!(buffered_cpu(128), 166);
        assert_eq!(node_count(166), 63);

        for total in 0..500u64 {
            let buffered = buffered_cpu(total);
            assert_eq!(buffered, (total as f64 * 1.3).round() as u64);
            assert_eq!(node_count(buffered), (buffered as f64 / 2.67).ceil() as u64);
        }
    }

    #[test]
    fn test_empty_input() {
        let grouping = group(&[], GroupingMode::Environment);
        let totals = Totals::from_records(&[]);

        assert!(grouping.is_empty());
        assert_eq!(totals.raw_monthly, 0.0);
        assert_eq!(totals.raw_annual, 0.0);
        assert_eq!(totals.average_monthly(), 0.0);
        assert!(totals.matches(&grouping));
    }

    #[test]
    fn test_totals_detect_divergent_grouping() {
        let mut records = vec![record("prod", "a", 100.0), record("dev", "b", 10.0)];
        let grouping = group(&records, GroupingMode::Environment);

        // A record added between the two summation passes
        records.push(record("dev", "b", 5.0));
        let totals = Totals::from_records(&records);

        assert!(!totals.matches(&grouping));
    }

    #[test]
    fn test_fractional_costs_agree_across_passes() {
        let records: Vec<NamespaceRequest> = (0..50)
            .map(|i| {
                let env = ["prod", "dev", "staging"][i % 3];
                record(env, "c", 413.46 + i as f64 * 0.01)
            })
            .collect();

        let totals = Totals::from_records(&records);
        assert!(totals.matches(&group(&records, GroupingMode::Environment)));
        assert!(totals.matches(&group(&records, GroupingMode::EnvironmentCluster)));
    }

    #[test]
    fn test_group_provisioner_from_first_record() {
        let mut first = record("prod", "a", 1.0);
        first.provisioner = Some("Tier3".to_string());
        let second = record("prod", "a", 1.0);

        let grouping = group(&[first, second], GroupingMode::Environment);
        assert_eq!(grouping.get("prod").unwrap().provisioner, "Tier3");

        let plain = group(&[record("dev", "b", 1.0)], GroupingMode::Environment);
        assert_eq!(plain.get("dev").unwrap().provisioner, DEFAULT_PROVISIONER);
    }
}

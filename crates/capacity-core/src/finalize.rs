//! Cost finalization with fallback reconciliation
//!
//! A finalize run submits the current namespaces to the remote cost
//! service and decides whether to trust the answer. The service is treated
//! as best-effort: a transport failure, a rejected request, an empty
//! breakdown or an implausibly low total all degrade to a summary computed
//! locally with the same field names, so rendering never depends on which
//! path produced it.

use crate::error::{CapacityError, Result};
use crate::models::{NamespaceRequest, DEFAULT_PROVISIONER};
use crate::observability::StructuredLogger;
use crate::results::ResultSet;
use crate::summary::{self, EnvironmentGroup, GroupingMode, Totals};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// The service total must reach this share of the locally expected total
pub const PLAUSIBLE_TOTAL_RATIO: f64 = 0.9;

/// Tolerance when checking group sums against the grand total
const CONSISTENCY_EPSILON: f64 = 0.005;

/// Reason recorded when the service answers `success: false` without an error
const REJECTED_MESSAGE: &str = "Failed to fetch finalized costs";

/// Request body for the finalize-cost endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub results: Vec<NamespaceRequest>,
}

/// Per-environment breakdown, shared by service and fallback summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedGroup {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default = "default_provisioner")]
    pub provisioner: String,
    #[serde(default)]
    pub namespace_count: u32,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub total_cpu: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub total_cpu_buffered: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub node_count: u64,
    #[serde(default)]
    pub raw_monthly: f64,
    #[serde(default)]
    pub raw_annual: f64,
    #[serde(default)]
    pub monthly_cost: String,
    #[serde(default)]
    pub annual_cost: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eks_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tribe_approver: Option<String>,
}

impl From<EnvironmentGroup> for FinalizedGroup {
    fn from(group: EnvironmentGroup) -> Self {
        Self {
            cluster_name: group.cluster_name,
            provisioner: group.provisioner,
            namespace_count: group.namespace_count,
            total_cpu: group.total_cpu,
            total_cpu_buffered: group.total_cpu_buffered,
            node_count: group.node_count,
            monthly_cost: format_currency(group.raw_monthly),
            annual_cost: format_currency(group.raw_annual),
            raw_monthly: group.raw_monthly,
            raw_annual: group.raw_annual,
            pdb: None,
            eks_version: None,
            tribe_approver: None,
        }
    }
}

/// Accepted result of a finalize run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedSummary {
    pub success: bool,
    pub finalized_costs: IndexMap<String, FinalizedGroup>,
    pub raw_total_monthly: f64,
    pub raw_total_annual: f64,
    pub total_monthly_cost: String,
    pub total_annual_cost: String,
}

impl FinalizedSummary {
    /// Summary computed locally from the records, grouped by environment
    pub fn from_records(records: &[NamespaceRequest]) -> Self {
        let grouping = summary::group(records, GroupingMode::Environment);
        let totals = Totals::from_records(records);

        Self {
            success: true,
            finalized_costs: grouping
                .groups
                .into_iter()
                .map(|(env, group)| (env, FinalizedGroup::from(group)))
                .collect(),
            raw_total_monthly: totals.raw_monthly,
            raw_total_annual: totals.raw_annual,
            total_monthly_cost: format_currency(totals.raw_monthly),
            total_annual_cost: format_currency(totals.raw_annual),
        }
    }

    /// Sum of per-group monthly and annual costs, as shown in the total row
    pub fn group_totals(&self) -> (f64, f64) {
        self.finalized_costs
            .values()
            .fold((0.0, 0.0), |(monthly, annual), group| {
                (monthly + group.raw_monthly, annual + group.raw_annual)
            })
    }

    /// Annual total, derived from the monthly total when absent
    pub fn annual_or_derived(&self) -> f64 {
        if self.raw_total_annual > 0.0 {
            self.raw_total_annual
        } else {
            self.raw_total_monthly * crate::formula::MONTHS_PER_YEAR
        }
    }

    /// Check that the group breakdown adds up to the grand total
    pub fn check_consistency(&self) -> Result<()> {
        let (monthly, _) = self.group_totals();
        if (monthly - self.raw_total_monthly).abs() > CONSISTENCY_EPSILON {
            return Err(CapacityError::ReconciliationMismatch {
                expected: self.raw_total_monthly,
                actual: monthly,
            });
        }
        Ok(())
    }
}

/// Response body of the finalize-cost endpoint
///
/// Every field is optional on the wire; [`assess`] decides whether the
/// response is usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalizeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_costs: Option<IndexMap<String, FinalizedGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_total_monthly: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_total_annual: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_monthly_cost: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_annual_cost: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Remote service producing the authoritative cost breakdown
#[async_trait]
pub trait CostService: Send + Sync {
    /// Submit the namespaces for finalization
    ///
    /// Transport failures and non-success HTTP statuses are returned as
    /// [`CapacityError::Transport`].
    async fn finalize(&self, results: &[NamespaceRequest]) -> Result<FinalizeResponse>;
}

/// Why a finalize run fell back to the local summary
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// Transport failure or non-2xx status
    Unavailable(String),
    /// The service answered with `success: false`
    Rejected(String),
    /// `finalized_costs` was absent or empty
    EmptyBreakdown,
    /// The service total fell below the plausible share of the expected total
    ImplausibleTotal { expected: f64, actual: f64 },
}

impl FallbackReason {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            FallbackReason::Unavailable(_) => "unavailable",
            FallbackReason::Rejected(_) => "rejected",
            FallbackReason::EmptyBreakdown => "empty_breakdown",
            FallbackReason::ImplausibleTotal { .. } => "implausible_total",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Unavailable(message) => {
                write!(f, "cost service unavailable: {}", message)
            }
            FallbackReason::Rejected(message) => {
                write!(f, "cost service rejected request: {}", message)
            }
            FallbackReason::EmptyBreakdown => {
                f.write_str("cost service returned no finalized costs")
            }
            FallbackReason::ImplausibleTotal { expected, actual } => write!(
                f,
                "{}",
                CapacityError::ReconciliationMismatch {
                    expected: *expected,
                    actual: *actual
                }
            ),
        }
    }
}

/// Which path produced the accepted summary
#[derive(Debug, Clone, PartialEq)]
pub enum SummarySource {
    Service,
    Fallback(FallbackReason),
}

impl SummarySource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, SummarySource::Fallback(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SummarySource::Service => "service",
            SummarySource::Fallback(_) => "fallback",
        }
    }
}

/// Outcome of one finalize run
#[derive(Debug, Clone)]
pub struct Finalization {
    pub summary: FinalizedSummary,
    pub source: SummarySource,
}

/// Decide whether a service response can be trusted
///
/// The breakdown must be non-empty and `raw_total_monthly` must reach 90%
/// of `expected_monthly`.
pub fn assess(
    response: FinalizeResponse,
    expected_monthly: f64,
) -> std::result::Result<FinalizedSummary, FallbackReason> {
    let mut finalized_costs = match response.finalized_costs {
        Some(costs) if !costs.is_empty() => costs,
        _ => return Err(FallbackReason::EmptyBreakdown),
    };

    let actual = response.raw_total_monthly.unwrap_or(0.0);
    if actual < expected_monthly * PLAUSIBLE_TOTAL_RATIO {
        return Err(FallbackReason::ImplausibleTotal {
            expected: expected_monthly,
            actual,
        });
    }

    // render the same strings the fallback breakdown carries
    for group in finalized_costs.values_mut() {
        if group.monthly_cost.is_empty() {
            group.monthly_cost = format_currency(group.raw_monthly);
        }
        if group.annual_cost.is_empty() {
            group.annual_cost = format_currency(group.raw_annual);
        }
    }

    let annual = response.raw_total_annual.unwrap_or(0.0);
    Ok(FinalizedSummary {
        success: true,
        finalized_costs,
        raw_total_monthly: actual,
        raw_total_annual: annual,
        total_monthly_cost: response
            .total_monthly_cost
            .unwrap_or_else(|| format_currency(actual)),
        total_annual_cost: response
            .total_annual_cost
            .unwrap_or_else(|| format_currency(annual)),
    })
}

enum ReconcileState {
    Collect,
    Fetch {
        snapshot: Vec<NamespaceRequest>,
    },
    Validate {
        snapshot: Vec<NamespaceRequest>,
        response: FinalizeResponse,
    },
    Fallback {
        snapshot: Vec<NamespaceRequest>,
        reason: FallbackReason,
    },
    Accept {
        summary: FinalizedSummary,
        source: SummarySource,
    },
}

/// Runs finalize and keeps the most recently accepted summary
#[derive(Clone)]
pub struct FinalizationReconciler {
    service: Arc<dyn CostService>,
    last_accepted: Arc<RwLock<Option<FinalizedSummary>>>,
    logger: StructuredLogger,
}

impl FinalizationReconciler {
    pub fn new(service: Arc<dyn CostService>, logger: StructuredLogger) -> Self {
        Self {
            service,
            last_accepted: Arc::new(RwLock::new(None)),
            logger,
        }
    }

    /// Summary accepted by the latest completed run
    pub async fn last_accepted(&self) -> Option<FinalizedSummary> {
        self.last_accepted.read().await.clone()
    }

    /// Run Collect -> Fetch -> Validate -> (Fallback) -> Accept
    ///
    /// Only an empty result set is an error; every service problem ends in
    /// the local fallback.
    pub async fn finalize(&self, results: &ResultSet) -> Result<Finalization> {
        let mut state = ReconcileState::Collect;

        loop {
            state = match state {
                ReconcileState::Collect => {
                    let snapshot = results.snapshot();
                    if snapshot.is_empty() {
                        return Err(CapacityError::EmptyInput);
                    }
                    debug!(namespaces = snapshot.len(), "Collected namespaces for finalize");
                    ReconcileState::Fetch { snapshot }
                }
                ReconcileState::Fetch { snapshot } => {
                    match self.service.finalize(&snapshot).await {
                        Ok(response) if response.success => {
                            ReconcileState::Validate { snapshot, response }
                        }
                        Ok(response) => ReconcileState::Fallback {
                            snapshot,
                            reason: FallbackReason::Rejected(
                                response
                                    .error
                                    .unwrap_or_else(|| REJECTED_MESSAGE.to_string()),
                            ),
                        },
                        Err(e) => ReconcileState::Fallback {
                            snapshot,
                            reason: FallbackReason::Unavailable(e.to_string()),
                        },
                    }
                }
                ReconcileState::Validate { snapshot, response } => {
                    let expected = Totals::from_records(&snapshot).raw_monthly;
                    match assess(response, expected) {
                        Ok(summary) => ReconcileState::Accept {
                            summary,
                            source: SummarySource::Service,
                        },
                        Err(reason) => ReconcileState::Fallback { snapshot, reason },
                    }
                }
                ReconcileState::Fallback { snapshot, reason } => {
                    self.logger.log_finalize_fallback(&reason, snapshot.len());
                    ReconcileState::Accept {
                        summary: FinalizedSummary::from_records(&snapshot),
                        source: SummarySource::Fallback(reason),
                    }
                }
                ReconcileState::Accept { summary, source } => {
                    self.logger.log_finalize_accepted(
                        source.label(),
                        summary.finalized_costs.len(),
                        summary.raw_total_monthly,
                    );
                    *self.last_accepted.write().await = Some(summary.clone());
                    return Ok(Finalization { summary, source });
                }
            };
        }
    }
}

/// Format as `$1,234.56`
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let digits = (cents / 100).to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Parse `$1,234.56` (or a bare number) back into an amount
pub fn parse_currency(text: &str) -> f64 {
    text.chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect::<String>()
        .parse()
        .unwrap_or(0.0)
}

fn default_provisioner() -> String {
    DEFAULT_PROVISIONER.to_string()
}

/// Counts arrive as numbers or as numeric strings such as `"166"`
fn deserialize_count<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Int(u64),
        Float(f64),
        Text(String),
    }

    Ok(match Count::deserialize(deserializer)? {
        Count::Int(value) => value,
        Count::Float(value) => value.max(0.0).round() as u64,
        Count::Text(text) => {
            let trimmed = text.trim().trim_end_matches('m');
            trimmed
                .parse::<u64>()
                .or_else(|_| trimmed.parse::<f64>().map(|v| v.max(0.0).round() as u64))
                .map_err(|_| serde::de::Error::custom(format!("invalid count '{}'", text)))?
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fields read by the tag store and the summary table
    const SUMMARY_FIELDS: &[&str] = &[
        "success",
        "finalized_costs",
        "raw_total_monthly",
        "raw_total_annual",
        "total_monthly_cost",
        "total_annual_cost",
    ];
    const GROUP_FIELDS: &[&str] = &[
        "cluster_name",
        "provisioner",
        "namespace_count",
        "total_cpu",
        "total_cpu_buffered",
        "node_count",
        "raw_monthly",
        "raw_annual",
        "monthly_cost",
        "annual_cost",
    ];

    enum Reply {
        Respond(FinalizeResponse),
        Fail(String),
    }

    struct StubService {
        replies: Mutex<Vec<Reply>>,
        calls: AtomicUsize,
    }

    impl StubService {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CostService for StubService {
        async fn finalize(&self, _results: &[NamespaceRequest]) -> Result<FinalizeResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.lock().unwrap().remove(0) {
                Reply::Respond(response) => Ok(response),
                Reply::Fail(message) => Err(CapacityError::Transport(message)),
            }
        }
    }

    fn results_totalling(monthly: &[(&str, f64)]) -> ResultSet {
        let mut set = ResultSet::new();
        for (env, cost) in monthly {
            let mut request = NamespaceRequest::new(*env, format!("eks-{}", env), "ns");
            request.monthly_cost = *cost;
            request.annual_cost = cost * 12.0;
            set.add(request);
        }
        set
    }

    fn service_response(raw_total_monthly: f64) -> FinalizeResponse {
        let group: FinalizedGroup = serde_json::from_value(serde_json::json!({
            "cluster_name": "eks-prod",
            "provisioner": "Tier2",
            "pdb": "minUnavailable = 1",
            "eks_version": "v1.32",
            "namespace_count": 1,
            "total_cpu": "128",
            "total_cpu_buffered": "167",
            "node_count": 73,
            "monthly_cost": format_currency(raw_total_monthly),
            "annual_cost": format_currency(raw_total_monthly * 12.0),
            "raw_monthly": raw_total_monthly,
            "raw_annual": raw_total_monthly * 12.0,
            "tribe_approver": "Unknown"
        }))
        .unwrap();

        FinalizeResponse {
            success: true,
            finalized_costs: Some(IndexMap::from([("prod".to_string(), group)])),
            raw_total_monthly: Some(raw_total_monthly),
            raw_total_annual: Some(raw_total_monthly * 12.0),
            total_monthly_cost: Some(format_currency(raw_total_monthly)),
            total_annual_cost: Some(format_currency(raw_total_monthly * 12.0)),
            error: None,
        }
    }

    fn reconciler(service: Arc<StubService>) -> FinalizationReconciler {
        FinalizationReconciler::new(service, StructuredLogger::new("test"))
    }

    #[test]
    fn test_assess_threshold() {
        // expected 1000: 850 is implausible, 950 is accepted
        let err = assess(service_response(850.0), 1000.0).unwrap_err();
        assert_eq!(
            err,
            FallbackReason::ImplausibleTotal {
                expected: 1000.0,
                actual: 850.0
            }
        );

        let summary = assess(service_response(950.0), 1000.0).unwrap();
        assert_eq!(summary.raw_total_monthly, 950.0);

        // exactly 90% is accepted
        assert!(assess(service_response(900.0), 1000.0).is_ok());
    }

    #[test]
    fn test_assess_rejects_empty_breakdown_regardless_of_total() {
        let mut empty = service_response(5000.0);
        empty.finalized_costs = Some(IndexMap::new());
        assert_eq!(assess(empty, 10.0).unwrap_err(), FallbackReason::EmptyBreakdown);

        let mut absent = service_response(5000.0);
        absent.finalized_costs = None;
        assert_eq!(assess(absent, 10.0).unwrap_err(), FallbackReason::EmptyBreakdown);
    }

    #[test]
    fn test_assess_backfills_group_cost_strings() {
        let mut response = service_response(950.0);
        if let Some(costs) = response.finalized_costs.as_mut() {
            let group = costs.get_mut("prod").unwrap();
            group.raw_monthly = 950.0;
            group.raw_annual = 11400.0;
            group.monthly_cost = String::new();
            group.annual_cost = "$11,000.00".to_string();
        }

        let summary = assess(response, 1000.0).unwrap();
        let prod = &summary.finalized_costs["prod"];
        assert_eq!(prod.monthly_cost, "$950.00");
        assert_eq!(prod.annual_cost, "$11,000.00");
    }

    #[test]
    fn test_assess_missing_total_counts_as_zero() {
        let mut response = service_response(1000.0);
        response.raw_total_monthly = None;
        assert!(matches!(
            assess(response, 1000.0),
            Err(FallbackReason::ImplausibleTotal { actual, .. }) if actual == 0.0
        ));
    }

    #[tokio::test]
    async fn test_empty_results_fail_without_calling_service() {
        let service = StubService::new(vec![]);
        let reconciler = reconciler(service.clone());

        let err = reconciler.finalize(&ResultSet::new()).await.unwrap_err();
        assert!(matches!(err, CapacityError::EmptyInput));
        assert_eq!(service.calls(), 0);
        assert!(reconciler.last_accepted().await.is_none());
    }

    #[tokio::test]
    async fn test_plausible_service_summary_is_accepted() {
        let service = StubService::new(vec![Reply::Respond(service_response(950.0))]);
        let reconciler = reconciler(service.clone());
        let results = results_totalling(&[("prod", 1000.0)]);

        let outcome = reconciler.finalize(&results).await.unwrap();
        assert_eq!(outcome.source, SummarySource::Service);
        assert_eq!(outcome.summary.raw_total_monthly, 950.0);
        assert_eq!(outcome.summary.finalized_costs["prod"].provisioner, "Tier2");
        assert_eq!(outcome.summary.finalized_costs["prod"].total_cpu_buffered, 167);
        assert_eq!(reconciler.last_accepted().await, Some(outcome.summary));
    }

    #[tokio::test]
    async fn test_implausible_total_falls_back() {
        let service = StubService::new(vec![Reply::Respond(service_response(850.0))]);
        let reconciler = reconciler(service);
        let results = results_totalling(&[("prod", 600.0), ("dev", 400.0)]);

        let outcome = reconciler.finalize(&results).await.unwrap();
        assert!(outcome.source.is_fallback());
        assert_eq!(outcome.summary.raw_total_monthly, 1000.0);
        assert_eq!(outcome.summary.finalized_costs.len(), 2);
        assert_eq!(outcome.summary.total_monthly_cost, "$1,000.00");
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_without_retry() {
        let service = StubService::new(vec![Reply::Fail("connection refused".to_string())]);
        let reconciler = reconciler(service.clone());
        let results = results_totalling(&[("dev", 10.0)]);

        let outcome = reconciler.finalize(&results).await.unwrap();
        assert!(matches!(
            outcome.source,
            SummarySource::Fallback(FallbackReason::Unavailable(_))
        ));
        assert_eq!(service.calls(), 1);
        assert_eq!(outcome.summary.finalized_costs["dev"].namespace_count, 1);
    }

    #[tokio::test]
    async fn test_rejected_response_falls_back() {
        let rejected = FinalizeResponse {
            success: false,
            error: Some("No data available for cost calculation.".to_string()),
            ..Default::default()
        };
        let service = StubService::new(vec![Reply::Respond(rejected)]);
        let reconciler = reconciler(service);

        let outcome = reconciler
            .finalize(&results_totalling(&[("dev", 10.0)]))
            .await
            .unwrap();
        assert_eq!(
            outcome.source,
            SummarySource::Fallback(FallbackReason::Rejected(
                "No data available for cost calculation.".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let service = StubService::new(vec![
            Reply::Respond(service_response(950.0)),
            Reply::Fail("timeout".to_string()),
        ]);
        let reconciler = reconciler(service);

        reconciler
            .finalize(&results_totalling(&[("prod", 1000.0)]))
            .await
            .unwrap();
        reconciler
            .finalize(&results_totalling(&[("dev", 42.0)]))
            .await
            .unwrap();

        let last = reconciler.last_accepted().await.unwrap();
        assert_eq!(last.raw_total_monthly, 42.0);
        assert!(last.finalized_costs.contains_key("dev"));
    }

    #[tokio::test]
    async fn test_fallback_and_service_expose_same_fields() {
        let results = results_totalling(&[("prod", 1000.0)]);

        let accepted = reconciler(StubService::new(vec![Reply::Respond(service_response(950.0))]))
            .finalize(&results)
            .await
            .unwrap();
        let fallback = reconciler(StubService::new(vec![Reply::Fail("down".to_string())]))
            .finalize(&results)
            .await
            .unwrap();
        assert!(!accepted.source.is_fallback());
        assert!(fallback.source.is_fallback());

        for summary in [accepted.summary, fallback.summary] {
            let json = serde_json::to_value(&summary).unwrap();
            for field in SUMMARY_FIELDS {
                assert!(json.get(field).is_some(), "missing summary field {}", field);
            }
            for group in json["finalized_costs"].as_object().unwrap().values() {
                for field in GROUP_FIELDS {
                    assert!(group.get(field).is_some(), "missing group field {}", field);
                }
            }
        }
    }

    #[test]
    fn test_fallback_summary_sizing() {
        let mut records = Vec::new();
        for (env, cost) in [("prod", 100.0), ("prod", 50.0), ("dev", 10.0)] {
            let mut request = NamespaceRequest::new(env, "eks", "ns");
            request.monthly_cost = cost;
            records.push(request);
        }

        let summary = FinalizedSummary::from_records(&records);
        let prod = &summary.finalized_costs["prod"];
        assert_eq!(prod.namespace_count, 2);
        assert_eq!(prod.total_cpu, 256);
        assert_eq!(prod.total_cpu_buffered, 333);
        assert_eq!(prod.node_count, 125);
        assert_eq!(prod.monthly_cost, "$150.00");
        assert_eq!(summary.raw_total_monthly, 160.0);
        assert!(summary.check_consistency().is_ok());
    }

    #[test]
    fn test_check_consistency_flags_divergent_breakdown() {
        let mut summary = assess(service_response(1000.0), 1000.0).unwrap();
        summary.raw_total_monthly = 1200.0;

        assert!(matches!(
            summary.check_consistency(),
            Err(CapacityError::ReconciliationMismatch { .. })
        ));
    }

    #[test]
    fn test_annual_derived_from_monthly_when_absent() {
        let mut summary = FinalizedSummary::from_records(&[]);
        summary.raw_total_monthly = 100.0;
        summary.raw_total_annual = 0.0;
        assert_eq!(summary.annual_or_derived(), 1200.0);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(413.46), "$413.46");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(999.999), "$1,000.00");
        assert_eq!(format_currency(-12.5), "-$12.50");
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("$1,234.56"), 1234.56);
        assert_eq!(parse_currency("42"), 42.0);
        assert_eq!(parse_currency("n/a"), 0.0);
    }

    #[test]
    fn test_counts_accept_strings_and_numbers() {
        let group: FinalizedGroup = serde_json::from_value(serde_json::json!({
            "total_cpu": "12",
            "total_cpu_buffered": 16,
            "node_count": 6.0
        }))
        .unwrap();

        assert_eq!(group.total_cpu, 12);
        assert_eq!(group.total_cpu_buffered, 16);
        assert_eq!(group.node_count, 6);
        assert_eq!(group.provisioner, "Tier1");

        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["total_cpu"], 12);
    }
}

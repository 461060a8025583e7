//! Finalize costs against the cost service

use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;
use std::time::Instant;
use tabled::Tabled;
use tracing::warn;

use super::AppContext;
use crate::client::ApiClient;
use crate::output::{
    color_source, print_info, print_json, print_table, print_warning, OutputFormat,
};
use capacity_core::finalize::{format_currency, Finalization, FinalizedGroup, FinalizedSummary};
use capacity_core::observability::{CapacityMetrics, StructuredLogger};
use capacity_core::tags::{self, COST_ESTIMATE_TAG};
use capacity_core::{CapacityError, FinalizationReconciler, SummarySource};

#[derive(Tabled)]
struct FinalizedRow {
    #[tabled(rename = "Environment")]
    env: String,
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Provisioner")]
    provisioner: String,
    #[tabled(rename = "Namespaces")]
    namespaces: String,
    #[tabled(rename = "CPU")]
    total_cpu: String,
    #[tabled(rename = "CPU +30%")]
    total_cpu_buffered: String,
    #[tabled(rename = "Nodes")]
    nodes: String,
    #[tabled(rename = "Approver")]
    approver: String,
    #[tabled(rename = "Monthly")]
    monthly: String,
    #[tabled(rename = "Annual")]
    annual: String,
}

impl FinalizedRow {
    fn new(env: &str, group: &FinalizedGroup) -> Self {
        Self {
            env: env.to_string(),
            cluster: group.cluster_name.clone(),
            provisioner: group.provisioner.clone(),
            namespaces: group.namespace_count.to_string(),
            total_cpu: group.total_cpu.to_string(),
            total_cpu_buffered: group.total_cpu_buffered.to_string(),
            nodes: group.node_count.to_string(),
            approver: group.tribe_approver.clone().unwrap_or_else(|| "-".to_string()),
            monthly: format_currency(group.raw_monthly),
            annual: format_currency(group.raw_annual),
        }
    }

    fn total(summary: &FinalizedSummary) -> Self {
        let blank = String::new;
        Self {
            env: "TOTAL".to_string(),
            cluster: blank(),
            provisioner: blank(),
            namespaces: summary
                .finalized_costs
                .values()
                .map(|group| group.namespace_count)
                .sum::<u32>()
                .to_string(),
            total_cpu: blank(),
            total_cpu_buffered: blank(),
            nodes: blank(),
            approver: blank(),
            monthly: summary.total_monthly_cost.clone(),
            annual: summary.total_annual_cost.clone(),
        }
    }
}

fn rows(summary: &FinalizedSummary) -> Vec<FinalizedRow> {
    summary
        .finalized_costs
        .iter()
        .map(|(env, group)| FinalizedRow::new(env, group))
        .chain(std::iter::once(FinalizedRow::total(summary)))
        .collect()
}

fn record_metrics(metrics: &CapacityMetrics, finalization: &Finalization, namespaces: usize) {
    metrics.inc_finalize_runs(finalization.source.label());
    if let SummarySource::Fallback(reason) = &finalization.source {
        metrics.inc_fallbacks(reason);
    }
    metrics.add_namespaces_processed(namespaces as u64);
}

pub async fn run(ctx: &mut AppContext) -> Result<()> {
    let client = ApiClient::new(&ctx.api_url, ctx.timeout)?;
    let reconciler = FinalizationReconciler::new(Arc::new(client), StructuredLogger::new("capctl"));
    let metrics = CapacityMetrics::new();

    let started = Instant::now();
    let finalization = reconciler.finalize(&ctx.session.results).await?;
    metrics.observe_finalize_latency(started.elapsed().as_secs_f64());
    record_metrics(&metrics, &finalization, ctx.session.results.len());

    if let Err(e) = finalization.summary.check_consistency() {
        warn!(error = %e, "Finalized breakdown does not add up");
    }

    ctx.session.last_accepted = reconciler.last_accepted().await;
    let summary = &finalization.summary;
    match ctx.format {
        OutputFormat::Json => print_json(summary)?,
        OutputFormat::Table => {
            println!("{}", "Finalized Cost Summary".bold());
            println!("{}", "=".repeat(60));
            print_table(&rows(summary));
            println!("Source: {}", color_source(finalization.source.label()));
            if let SummarySource::Fallback(reason) = &finalization.source {
                print_warning(&format!("Using local calculation ({})", reason));
            }
        }
    }

    let estimate = tags::cost_estimate_text(Some(summary), &ctx.session.results);
    match tags::sync_cost_estimate(&mut ctx.session.form, Some(summary), &ctx.session.results) {
        Ok(()) => {}
        Err(CapacityError::MissingDisplayTarget(target)) => {
            warn!(target = %target, "Cost estimate tag not available");
        }
        Err(e) => return Err(e.into()),
    }
    let missing = tags::sync_request_information(&mut ctx.session.form);
    if !missing.is_empty() {
        warn!(missing = ?missing, "Request information partially rendered");
    }
    ctx.save()?;

    if ctx.format == OutputFormat::Table {
        let shown = ctx.session.form.get(COST_ESTIMATE_TAG).unwrap_or(estimate.as_str());
        print_info(&format!("Cost estimate: {}", shown));
    }

    Ok(())
}

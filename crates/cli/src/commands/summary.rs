//! Local environment summary

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde_json::json;
use tabled::Tabled;

use super::AppContext;
use crate::output::{print_json, print_table, print_warning, OutputFormat};
use capacity_core::finalize::format_currency;
use capacity_core::summary::{self, EnvironmentGroup, Grouping, GroupingMode, Totals};

/// Grouping key for the summary table
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum GroupBy {
    /// One row per environment
    #[default]
    Env,
    /// One row per environment and cluster
    EnvCluster,
}

impl From<GroupBy> for GroupingMode {
    fn from(by: GroupBy) -> Self {
        match by {
            GroupBy::Env => GroupingMode::Environment,
            GroupBy::EnvCluster => GroupingMode::EnvironmentCluster,
        }
    }
}

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "Group")]
    key: String,
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Provisioner")]
    provisioner: String,
    #[tabled(rename = "Namespaces")]
    namespaces: u32,
    #[tabled(rename = "CPU")]
    total_cpu: u64,
    #[tabled(rename = "CPU +30%")]
    total_cpu_buffered: u64,
    #[tabled(rename = "Nodes")]
    nodes: u64,
    #[tabled(rename = "Monthly")]
    monthly: String,
    #[tabled(rename = "Annual")]
    annual: String,
}

impl GroupRow {
    fn new(key: &str, group: &EnvironmentGroup) -> Self {
        Self {
            key: key.to_string(),
            cluster: group.cluster_name.clone(),
            provisioner: group.provisioner.clone(),
            namespaces: group.namespace_count,
            total_cpu: group.total_cpu,
            total_cpu_buffered: group.total_cpu_buffered,
            nodes: group.node_count,
            monthly: format_currency(group.raw_monthly),
            annual: format_currency(group.raw_annual),
        }
    }
}

fn rows(grouping: &Grouping) -> Vec<GroupRow> {
    grouping
        .groups
        .iter()
        .map(|(key, group)| GroupRow::new(key, group))
        .collect()
}

pub fn show(ctx: &AppContext, by: GroupBy) -> Result<()> {
    let records = ctx.session.results.records();
    let grouping = summary::group(records, by.into());
    let totals = Totals::from_records(records);

    match ctx.format {
        OutputFormat::Json => print_json(&json!({
            "grouping": grouping,
            "totals": totals,
        }))?,
        OutputFormat::Table => {
            print_table(&rows(&grouping));
            if grouping.is_empty() {
                return Ok(());
            }

            println!();
            println!(
                "{} {} namespaces, {}/month, {}/year (avg {}/namespace)",
                "Total:".bold(),
                totals.namespace_count,
                format_currency(totals.raw_monthly).green(),
                format_currency(totals.raw_annual),
                format_currency(totals.average_monthly())
            );
            if !totals.matches(&grouping) {
                print_warning("Group totals do not add up to the grand total");
            }
        }
    }

    Ok(())
}

//! Namespace result set commands

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;
use tabled::Tabled;

use super::AppContext;
use crate::output::{
    format_cpu, print_info, print_json, print_success, print_table, print_warning, OutputFormat,
};
use capacity_core::finalize::format_currency;
use capacity_core::validation::validate;
use capacity_core::{CostFormula, NamespaceRequest, SidecarOverhead, SizeTier, TierPricing};

/// Namespace sizing input
#[derive(Debug, Args)]
pub struct AddArgs {
    /// Environment (e.g. prod, staging, dev)
    #[arg(long)]
    pub env: String,

    /// Target cluster
    #[arg(long)]
    pub cluster: String,

    /// Namespace name
    #[arg(long, short)]
    pub namespace: String,

    /// Pod count
    #[arg(long, default_value_t = 1)]
    pub pods: u32,

    /// CPU request per pod in millicores
    #[arg(long, default_value_t = 0)]
    pub cpu_req: u32,

    /// CPU limit per pod in millicores
    #[arg(long, default_value_t = 0)]
    pub cpu_lim: u32,

    /// Memory request per pod in MiB
    #[arg(long, default_value_t = 0)]
    pub mem_req: u32,

    /// Memory limit per pod in MiB
    #[arg(long, default_value_t = 0)]
    pub mem_lim: u32,

    #[arg(long, default_value_t = 0)]
    pub hpa_min: u32,

    #[arg(long, default_value_t = 0)]
    pub hpa_max: u32,

    /// HPA CPU trigger (e.g. 70%)
    #[arg(long)]
    pub cpu_trigger: Option<String>,

    /// Add istio sidecar overhead to every pod
    #[arg(long)]
    pub istio: bool,

    #[arg(long, default_value_t = 0)]
    pub istio_cpu_req: u32,

    #[arg(long, default_value_t = 0)]
    pub istio_cpu_lim: u32,

    #[arg(long, default_value_t = 0)]
    pub istio_mem_req: u32,

    #[arg(long, default_value_t = 0)]
    pub istio_mem_lim: u32,

    /// Force a node tier instead of the smallest fitting one
    #[arg(long = "override")]
    pub override_size: Option<SizeTier>,

    /// Explicit CPU footprint in cores for environment sizing
    #[arg(long)]
    pub cpu_core_ns: Option<u32>,

    #[arg(long)]
    pub provisioner: Option<String>,

    /// Tribe (defaults to the metadata form tribe)
    #[arg(long)]
    pub tribe: Option<String>,

    /// Disruption budget reported with the environment
    #[arg(long)]
    pub pdb: Option<String>,

    /// EKS version reported with the environment
    #[arg(long)]
    pub eks_version: Option<String>,
}

impl AddArgs {
    fn into_request(self) -> NamespaceRequest {
        let mut request = NamespaceRequest::new(self.env, self.cluster, self.namespace);
        request.pods = self.pods;
        request.cpu_req = self.cpu_req;
        request.cpu_lim = self.cpu_lim;
        request.mem_req = self.mem_req;
        request.mem_lim = self.mem_lim;
        request.hpa_min = self.hpa_min;
        request.hpa_max = self.hpa_max;
        request.cpu_trigger = self.cpu_trigger;
        request.istio = SidecarOverhead {
            enabled: self.istio,
            cpu_req: self.istio_cpu_req,
            cpu_lim: self.istio_cpu_lim,
            mem_req: self.istio_mem_req,
            mem_lim: self.istio_mem_lim,
        };
        request.override_size = self.override_size;
        request.cpu_core_ns = self.cpu_core_ns;
        request.provisioner = self.provisioner;
        request.tribe = self.tribe;
        request.pdb = self.pdb;
        request.eks_version = self.eks_version;
        request
    }
}

/// Row for the namespace table
#[derive(Tabled)]
struct NamespaceRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Env")]
    env: String,
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Pods")]
    pods: u32,
    #[tabled(rename = "CPU")]
    total_cpu: String,
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Monthly")]
    monthly: String,
    #[tabled(rename = "Annual")]
    annual: String,
}

impl From<&NamespaceRequest> for NamespaceRow {
    fn from(request: &NamespaceRequest) -> Self {
        Self {
            id: request.id,
            env: request.env.clone(),
            cluster: request.cluster.clone(),
            namespace: request.namespace.clone(),
            pods: request.pods,
            total_cpu: format_cpu(request.total_cpu),
            tier: request
                .override_size
                .map(|tier| tier.to_string())
                .unwrap_or_else(|| "auto".to_string()),
            monthly: format_currency(request.monthly_cost),
            annual: format_currency(request.annual_cost),
        }
    }
}

/// Validate, price and append a namespace
pub fn add(ctx: &mut AppContext, args: AddArgs) -> Result<()> {
    let mut request = args.into_request();
    if request.tribe.is_none() {
        request.tribe = ctx
            .session
            .form
            .get("tribe")
            .filter(|tribe| !tribe.trim().is_empty())
            .map(str::to_string);
    }

    validate(&request)?;
    TierPricing::default().apply(&mut request);

    let added = ctx.session.results.add(request);
    let message = format!(
        "Added {} ({}/{}) as #{} at {}/month",
        added.namespace,
        added.env,
        added.cluster,
        added.id,
        format_currency(added.monthly_cost)
    );
    ctx.save()?;

    print_success(&message);
    Ok(())
}

pub fn list(ctx: &AppContext) -> Result<()> {
    let results = &ctx.session.results;

    match ctx.format {
        OutputFormat::Json => print_json(results.records())?,
        OutputFormat::Table => {
            let rows: Vec<NamespaceRow> = results.iter().map(NamespaceRow::from).collect();
            print_table(&rows);
            if !results.is_empty() {
                println!(
                    "\n{} {} namespaces, {}/month, {}/year",
                    "Total:".bold(),
                    results.len(),
                    format_currency(results.total_monthly()),
                    format_currency(results.total_annual())
                );
            }
        }
    }

    Ok(())
}

/// Re-price one namespace on a forced tier
pub fn override_size(ctx: &mut AppContext, id: u64, tier: SizeTier) -> Result<()> {
    if !ctx
        .session
        .results
        .update_override(id, tier, &TierPricing::default())
    {
        print_warning(&format!("No namespace with id {}", id));
        return Ok(());
    }
    ctx.save()?;

    if let Some(record) = ctx.session.results.find_by_id(id) {
        print_success(&format!(
            "#{} now on {} at {}/month",
            id,
            tier,
            format_currency(record.monthly_cost)
        ));
    }
    Ok(())
}

pub fn reset(ctx: &mut AppContext) -> Result<()> {
    ctx.session.results.reset();
    ctx.save()?;
    print_success("Cleared all namespaces");
    Ok(())
}

/// Replace the result set from a JSON array file
pub fn import(ctx: &mut AppContext, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).context("Import file is not valid JSON")?;

    let count = ctx.session.results.import_json(value)?;
    ctx.save()?;

    print_success(&format!("Imported {} namespaces", count));
    Ok(())
}

/// Write the result set as a JSON array, to a file or stdout
pub fn export(ctx: &AppContext, file: Option<&Path>) -> Result<()> {
    let records = ctx.session.results.records();

    match file {
        Some(path) => {
            let content = serde_json::to_string_pretty(records)?;
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_info(&format!("Exported {} namespaces to {}", records.len(), path.display()));
        }
        None => print_json(records)?,
    }

    Ok(())
}

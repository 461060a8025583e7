//! Per-namespace cost formula
//!
//! The formula is a pluggable pure function from a namespace request to a
//! cost estimate. [`TierPricing`] is the default node-tier implementation.

use crate::models::{NamespaceRequest, SizeTier};
use serde::{Deserialize, Serialize};

/// Months per year used to annualize monthly costs
pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Derived cost fields for one namespace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub monthly_cost: f64,
    pub annual_cost: f64,
    /// pods * cpu_req, in millicores
    pub total_cpu: u64,
}

/// Maps a namespace request to its estimated cost
///
/// Implementations must be deterministic and side-effect free.
pub trait CostFormula: Send + Sync {
    fn estimate(&self, request: &NamespaceRequest) -> CostEstimate;

    /// Estimate and write the derived fields back onto the request
    fn apply(&self, request: &mut NamespaceRequest) {
        let estimate = self.estimate(request);
        request.monthly_cost = estimate.monthly_cost;
        request.annual_cost = estimate.annual_cost;
        request.total_cpu = estimate.total_cpu;
    }
}

/// Capacity and price of one node tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierPrice {
    pub tier: SizeTier,
    pub cpu_max: u32,
    pub monthly: f64,
}

/// Node-tier pricing table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPricing {
    /// Ordered from smallest to largest capacity
    pub tiers: Vec<TierPrice>,
}

impl Default for TierPricing {
    fn default() -> Self {
        Self {
            tiers: vec![
                TierPrice {
                    tier: SizeTier::Tier1,
                    cpu_max: 8,
                    monthly: 413.46,
                },
                TierPrice {
                    tier: SizeTier::Tier2,
                    cpu_max: 16,
                    monthly: 583.84,
                },
                TierPrice {
                    tier: SizeTier::Tier3,
                    cpu_max: 32,
                    monthly: 1102.56,
                },
                TierPrice {
                    tier: SizeTier::Tier4,
                    cpu_max: 64,
                    monthly: 2205.12,
                },
            ],
        }
    }
}

impl TierPricing {
    pub fn price_of(&self, tier: SizeTier) -> Option<&TierPrice> {
        self.tiers.iter().find(|price| price.tier == tier)
    }

    /// Smallest tier whose node fits one pod, else the largest tier
    fn fitting_tier(&self, per_pod_cores: f64) -> Option<&TierPrice> {
        self.tiers
            .iter()
            .find(|price| price.cpu_max as f64 >= per_pod_cores)
            .or_else(|| self.tiers.last())
    }
}

impl CostFormula for TierPricing {
    fn estimate(&self, request: &NamespaceRequest) -> CostEstimate {
        let total_cpu = request.pods as u64 * request.cpu_req as u64;

        let sidecar_cpu = if request.istio.enabled {
            request.istio.cpu_req
        } else {
            0
        };
        let per_pod_cores = (request.cpu_req as f64 + sidecar_cpu as f64) / 1000.0;
        let replicas = request.pods.max(request.hpa_min);
        let cores = replicas as f64 * per_pod_cores;

        let price = match request.override_size {
            Some(tier) => self.price_of(tier).or_else(|| self.fitting_tier(per_pod_cores)),
            None => self.fitting_tier(per_pod_cores),
        };

        let monthly_cost = match price {
            Some(price) if cores > 0.0 && price.cpu_max > 0 => {
                let nodes = (cores / price.cpu_max as f64).ceil().max(1.0);
                nodes * price.monthly
            }
            _ => 0.0,
        };

        CostEstimate {
            monthly_cost,
            annual_cost: monthly_cost * MONTHS_PER_YEAR,
            total_cpu,
        }
    }
}

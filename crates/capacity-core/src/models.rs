//! Core data models for namespace capacity estimation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment name that gets production sizing
pub const PROD_ENV: &str = "prod";

/// Default provisioner label reported when a namespace does not carry one
pub const DEFAULT_PROVISIONER: &str = "Tier1";

/// Node size tier, used both as provisioner label and as a cost override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeTier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl SizeTier {
    pub const ALL: [SizeTier; 4] = [
        SizeTier::Tier1,
        SizeTier::Tier2,
        SizeTier::Tier3,
        SizeTier::Tier4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeTier::Tier1 => "Tier1",
            SizeTier::Tier2 => "Tier2",
            SizeTier::Tier3 => "Tier3",
            SizeTier::Tier4 => "Tier4",
        }
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SizeTier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown size tier '{}', expected Tier1..Tier4", s))
    }
}

/// Service-mesh sidecar overhead added to every pod when enabled
///
/// Flattened into the request on the wire as `istio`, `istio_cpu_req`, ...
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidecarOverhead {
    #[serde(rename = "istio", default, deserialize_with = "deserialize_toggle")]
    pub enabled: bool,
    #[serde(rename = "istio_cpu_req", default)]
    pub cpu_req: u32,
    #[serde(rename = "istio_cpu_lim", default)]
    pub cpu_lim: u32,
    #[serde(rename = "istio_mem_req", default)]
    pub mem_req: u32,
    #[serde(rename = "istio_mem_lim", default)]
    pub mem_lim: u32,
}

/// One namespace row: user input plus derived cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceRequest {
    #[serde(default)]
    pub id: u64,
    pub env: String,
    pub cluster: String,
    pub namespace: String,
    #[serde(default)]
    pub pods: u32,
    /// CPU request per pod in millicores
    #[serde(default)]
    pub cpu_req: u32,
    #[serde(default)]
    pub cpu_lim: u32,
    /// Memory request per pod in MiB
    #[serde(default)]
    pub mem_req: u32,
    #[serde(default)]
    pub mem_lim: u32,
    #[serde(default)]
    pub hpa_min: u32,
    #[serde(default)]
    pub hpa_max: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_trigger: Option<String>,
    #[serde(flatten)]
    pub istio: SidecarOverhead,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_size: Option<SizeTier>,
    /// Explicit CPU footprint in cores used by environment aggregation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_core_ns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tribe: Option<String>,
    /// Disruption budget reported for the environment, e.g. `minUnavailable = 1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eks_version: Option<String>,
    #[serde(rename = "monthlyCost", default)]
    pub monthly_cost: f64,
    #[serde(rename = "annualCost", default)]
    pub annual_cost: f64,
    /// pods * cpu_req, in millicores
    #[serde(default)]
    pub total_cpu: u64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl NamespaceRequest {
    pub fn new(
        env: impl Into<String>,
        cluster: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            env: env.into(),
            cluster: cluster.into(),
            namespace: namespace.into(),
            pods: 0,
            cpu_req: 0,
            cpu_lim: 0,
            mem_req: 0,
            mem_lim: 0,
            hpa_min: 0,
            hpa_max: 0,
            cpu_trigger: None,
            istio: SidecarOverhead::default(),
            override_size: None,
            cpu_core_ns: None,
            provisioner: None,
            tribe: None,
            pdb: None,
            eks_version: None,
            monthly_cost: 0.0,
            annual_cost: 0.0,
            total_cpu: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn is_prod(&self) -> bool {
        self.env == PROD_ENV
    }

    /// Provisioner label, falling back to the default tier
    pub fn provisioner_label(&self) -> &str {
        self.provisioner.as_deref().unwrap_or(DEFAULT_PROVISIONER)
    }
}

/// Accepts `true`/`false` as well as the `enabled`/`disabled` select values
fn deserialize_toggle<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Toggle {
        Bool(bool),
        Text(String),
    }

    Ok(match Toggle::deserialize(deserializer)? {
        Toggle::Bool(value) => value,
        Toggle::Text(text) => matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "enabled" | "yes" | "true" | "on"
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_tier_parse_is_case_insensitive() {
        assert_eq!("tier3".parse::<SizeTier>().unwrap(), SizeTier::Tier3);
        assert_eq!(" Tier1 ".parse::<SizeTier>().unwrap(), SizeTier::Tier1);
        assert!("Tier9".parse::<SizeTier>().is_err());
    }

    #[test]
    fn test_request_wire_names() {
        let mut request = NamespaceRequest::new("prod", "eks-a", "payments");
        request.monthly_cost = 12.5;
        request.istio.enabled = true;
        request.istio.cpu_req = 100;

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["monthlyCost"], 12.5);
        assert_eq!(json["istio"], true);
        assert_eq!(json["istio_cpu_req"], 100);
        assert!(json.get("override_size").is_none());
    }

    #[test]
    fn test_request_accepts_select_style_sidecar_flag() {
        let json = serde_json::json!({
            "env": "dev",
            "cluster": "eks-dev",
            "namespace": "wallet",
            "pods": 2,
            "istio": "enabled",
            "istio_cpu_req": 50
        });

        let request: NamespaceRequest = serde_json::from_value(json).unwrap();
        assert!(request.istio.enabled);
        assert_eq!(request.istio.cpu_req, 50);
        assert_eq!(request.monthly_cost, 0.0);
        assert_eq!(request.provisioner_label(), "Tier1");
    }

    #[test]
    fn test_request_requires_classification() {
        let json = serde_json::json!({ "pods": 2 });
        assert!(serde_json::from_value::<NamespaceRequest>(json).is_err());
    }
}

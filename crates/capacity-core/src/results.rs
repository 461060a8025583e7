//! Ordered set of namespace requests with session-unique ids

use crate::error::{CapacityError, Result};
use crate::formula::CostFormula;
use crate::models::{NamespaceRequest, SizeTier};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The live list of namespace requests
///
/// Insertion order is display order. Ids are assigned here and never reused
/// until [`ResultSet::reset`]. Callers refresh any display after mutating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSet {
    records: Vec<NamespaceRequest>,
    next_id: u64,
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSet {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
        }
    }

    fn generate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Append a request, assigning it the next id
    pub fn add(&mut self, mut request: NamespaceRequest) -> &NamespaceRequest {
        request.id = self.generate_id();
        debug!(id = request.id, namespace = %request.namespace, "Namespace added");
        self.records.push(request);
        &self.records[self.records.len() - 1]
    }

    pub fn find_by_id(&self, id: u64) -> Option<&NamespaceRequest> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Set a size override and recompute the record's cost in place
    ///
    /// Returns `false` and leaves the set untouched when `id` is unknown.
    pub fn update_override(
        &mut self,
        id: u64,
        tier: SizeTier,
        formula: &dyn CostFormula,
    ) -> bool {
        let Some(record) = self.records.iter_mut().find(|record| record.id == id) else {
            debug!(id, "Override ignored, namespace not found");
            return false;
        };

        record.override_size = Some(tier);
        formula.apply(record);
        debug!(id, tier = %tier, monthly = record.monthly_cost, "Override applied");
        true
    }

    /// Clear all records and restart ids at 1
    pub fn reset(&mut self) {
        self.records.clear();
        self.next_id = 1;
    }

    /// Replace every record, assigning fresh ids in order
    pub fn replace_all(&mut self, records: Vec<NamespaceRequest>) {
        self.records.clear();
        for mut record in records {
            record.id = self.generate_id();
            self.records.push(record);
        }
    }

    /// Replace every record from untyped JSON
    ///
    /// Fails with [`CapacityError::InvalidInput`] unless `value` is an array
    /// of record-shaped objects; the set is unchanged on failure.
    pub fn import_json(&mut self, value: serde_json::Value) -> Result<usize> {
        let serde_json::Value::Array(items) = value else {
            return Err(CapacityError::InvalidInput(
                "Expected array of namespace results".to_string(),
            ));
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<NamespaceRequest>(item).map_err(|e| {
                    CapacityError::InvalidInput(format!(
                        "entry {} is not a namespace result: {}",
                        index, e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let count = records.len();
        self.replace_all(records);
        Ok(count)
    }

    /// Copy of the current records
    pub fn snapshot(&self) -> Vec<NamespaceRequest> {
        self.records.clone()
    }

    pub fn records(&self) -> &[NamespaceRequest] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamespaceRequest> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_monthly(&self) -> f64 {
        self.records.iter().map(|record| record.monthly_cost).sum()
    }

    pub fn total_annual(&self) -> f64 {
        self.records.iter().map(|record| record.annual_cost).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::TierPricing;

    fn request(env: &str, namespace: &str) -> NamespaceRequest {
        let mut request = NamespaceRequest::new(env, "eks-a", namespace);
        request.pods = 20;
        request.cpu_req = 1000;
        request
    }

    #[test]
    fn test_ids_strictly_increase() {
        let mut set = ResultSet::new();
        let ids: Vec<u64> = (0..5)
            .map(|i| set.add(request("dev", &format!("ns-{}", i))).id)
            .collect();

        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_add_ignores_incoming_id() {
        let mut set = ResultSet::new();
        let mut req = request("dev", "wallet");
        req.id = 42;

        assert_eq!(set.add(req).id, 1);
        assert!(set.find_by_id(42).is_none());
        assert!(set.find_by_id(1).is_some());
    }

    #[test]
    fn test_reset_restarts_ids() {
        let mut set = ResultSet::new();
        set.add(request("dev", "a"));
        set.add(request("dev", "b"));

        set.reset();
        assert!(set.is_empty());
        assert_eq!(set.add(request("dev", "c")).id, 1);
    }

    #[test]
    fn test_update_override_recomputes_cost() {
        let pricing = TierPricing::default();
        let mut set = ResultSet::new();
        let mut req = request("prod", "payments");
        pricing.apply(&mut req);
        let id = set.add(req).id;
        let before = set.find_by_id(id).unwrap().monthly_cost;

        assert!(set.update_override(id, SizeTier::Tier4, &pricing));

        let updated = set.find_by_id(id).unwrap();
        assert_eq!(updated.override_size, Some(SizeTier::Tier4));
        assert_ne!(updated.monthly_cost, before);
        assert!((updated.monthly_cost - 2205.12).abs() < 1e-9);
    }

    #[test]
    fn test_update_override_unknown_id_is_noop() {
        let pricing = TierPricing::default();
        let mut set = ResultSet::new();
        set.add(request("dev", "wallet"));
        let before = set.snapshot();

        assert!(!set.update_override(99, SizeTier::Tier2, &pricing));
        assert_eq!(set.snapshot(), before);
    }

    #[test]
    fn test_replace_all_assigns_fresh_ids() {
        let mut set = ResultSet::new();
        set.add(request("dev", "old"));

        let mut incoming = vec![request("prod", "a"), request("dev", "b")];
        incoming[0].id = 7;
        incoming[1].id = 7;
        incoming[1].monthly_cost = 55.0;
        set.replace_all(incoming);

        let ids: Vec<u64> = set.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(set.records()[1].namespace, "b");
        assert_eq!(set.records()[1].monthly_cost, 55.0);
    }

    #[test]
    fn test_import_json_rejects_non_array() {
        let mut set = ResultSet::new();
        set.add(request("dev", "keep"));

        let err = set
            .import_json(serde_json::json!({ "results": [] }))
            .unwrap_err();
        assert!(matches!(err, CapacityError::InvalidInput(_)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_import_json_rejects_non_record_entries() {
        let mut set = ResultSet::new();
        set.add(request("dev", "keep"));

        let err = set
            .import_json(serde_json::json!([
                { "env": "dev", "cluster": "c", "namespace": "n" },
                42
            ]))
            .unwrap_err();
        assert!(matches!(err, CapacityError::InvalidInput(_)));
        assert_eq!(set.records()[0].namespace, "keep");
    }

    #[test]
    fn test_import_json_replaces_records() {
        let mut set = ResultSet::new();
        let count = set
            .import_json(serde_json::json!([
                { "id": 10, "env": "prod", "cluster": "eks-prod", "namespace": "a", "monthlyCost": 100.0 },
                { "id": 11, "env": "dev", "cluster": "eks-dev", "namespace": "b", "monthlyCost": 10.0 }
            ]))
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(set.records()[0].id, 1);
        assert_eq!(set.total_monthly(), 110.0);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut set = ResultSet::new();
        set.add(request("dev", "a"));

        let mut snapshot = set.snapshot();
        snapshot.clear();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_serialized_session_keeps_id_counter() {
        let mut set = ResultSet::new();
        set.add(request("dev", "a"));
        set.add(request("dev", "b"));

        let json = serde_json::to_string(&set).unwrap();
        let mut restored: ResultSet = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.add(request("dev", "c")).id, 3);
    }
}

//! Input validation for namespace requests

use crate::error::{CapacityError, Result};
use crate::models::NamespaceRequest;

/// Validate a namespace request before it is added to the result set
///
/// All problems are collected so they can be shown together.
pub fn validate(request: &NamespaceRequest) -> Result<()> {
    let mut errors = Vec::new();

    let required = [
        ("Env", request.env.as_str()),
        ("Cluster", request.cluster.as_str()),
        ("Namespace", request.namespace.as_str()),
    ];
    for (label, value) in required {
        if value.trim().is_empty() {
            errors.push(format!("{} is required", label));
        }
    }

    if request.hpa_min > request.hpa_max {
        errors.push("HPA min cannot be greater than HPA max".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CapacityError::Validation(errors))
    }
}

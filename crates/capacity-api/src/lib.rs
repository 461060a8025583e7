//! Cost-finalization service
//!
//! Computes the authoritative per-environment cost breakdown and serves
//! organization directory lookups for the capacity estimator.

pub mod api;
pub mod config;
pub mod sizing;

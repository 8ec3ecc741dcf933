//! Hourly pricing for Kubernetes nodes, volumes and network egress.
//!
//! [`providers::select_provider`] picks a backend for a cluster,
//! [`providers::CustomProvider`] prices resources from a JSON pricing
//! record, and [`storage`] keeps the cluster id to name registry.

pub mod config;
pub mod error;
pub mod keys;
pub mod pricing;
pub mod providers;
pub mod storage;
pub mod types;

pub use error::{Error, Result};

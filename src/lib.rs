//! fleetplane: a control plane of control planes
//!
//! Operators register one management Kubernetes cluster per region, then
//! provision, enumerate, inspect and delete tenant control planes (Kamaji
//! `TenantControlPlane` resources) inside those clusters through a single
//! API. [`manager::FleetManager`] is the entry point.

pub mod authz;
pub mod backend;
pub mod config;
pub mod connectivity;
pub mod crd;
pub mod error;
pub mod id;
pub mod manager;
pub mod model;
pub mod provisioner;
pub mod registrar;
pub mod router;
pub mod store;
pub mod version;

#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, ErrorKind, Result};

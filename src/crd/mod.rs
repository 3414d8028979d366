//! Custom Resource Definitions used by fleetplane
//!
//! `ClusterRegistration` is owned by fleetplane; `TenantControlPlane` is the
//! Kamaji resource created inside management clusters.

mod registration;
mod tenant_control_plane;

pub use registration::{ClusterRegistration, ClusterRegistrationSpec};
pub use tenant_control_plane::{
    AddonSpec, AddonsSpec, ComponentResources, ComponentsResources, ControlPlaneSpec,
    DeploymentSpec, KonnectivityServerSpec, KonnectivitySpec, KubeletSpec, KubernetesResourcesStatus,
    KubernetesSpec, KubernetesVersionStatus, NetworkProfileSpec, ServiceSpec, TenantControlPlane,
    TenantControlPlaneSpec, TenantControlPlaneStatus,
};

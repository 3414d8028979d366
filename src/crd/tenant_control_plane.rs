//! Typed view of the Kamaji `TenantControlPlane` resource
//!
//! Only the fields fleetplane writes or reads are modelled. Everything the
//! Kamaji controller adds on its own is ignored on deserialization.

use std::collections::BTreeMap;

use kube::core::DynamicObject;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kamaji.clastix.io",
    version = "v1alpha1",
    kind = "TenantControlPlane",
    namespaced,
    status = "TenantControlPlaneStatus",
    shortname = "tcp"
)]
#[serde(rename_all = "camelCase")]
pub struct TenantControlPlaneSpec {
    pub control_plane: ControlPlaneSpec,
    pub kubernetes: KubernetesSpec,
    #[serde(default)]
    pub network_profile: NetworkProfileSpec,
    #[serde(default)]
    pub addons: AddonsSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneSpec {
    pub deployment: DeploymentSpec,
    pub service: ServiceSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    pub replicas: i32,
    #[serde(default)]
    pub resources: ComponentsResources,
}

/// Per-component compute resources of the control plane pods
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentsResources {
    #[serde(default)]
    pub api_server: ComponentResources,
    #[serde(default)]
    pub controller_manager: ComponentResources,
    #[serde(default)]
    pub scheduler: ComponentResources,
}

/// Quantities keyed by resource name (`cpu`, `memory`)
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ComponentResources {
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    pub service_type: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesSpec {
    pub version: String,
    #[serde(default)]
    pub kubelet: KubeletSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeletSpec {
    #[serde(default)]
    pub cgroupfs: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfileSpec {
    #[serde(default)]
    pub port: i32,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddonsSpec {
    #[serde(rename = "coreDNS", skip_serializing_if = "Option::is_none")]
    pub core_dns: Option<AddonSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kube_proxy: Option<AddonSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub konnectivity: Option<KonnectivitySpec>,
}

/// Addon enabled with the backend defaults
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct AddonSpec {}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct KonnectivitySpec {
    pub server: KonnectivityServerSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct KonnectivityServerSpec {
    pub port: i32,
}

/// Observed state published by the Kamaji controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantControlPlaneStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_resources: Option<KubernetesResourcesStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesResourcesStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<KubernetesVersionStatus>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesVersionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Provisioning, Upgrading, Migrating, Ready, NotReady, Sleeping, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl TenantControlPlaneStatus {
    /// Phase string as reported by the backend, if any
    pub fn phase(&self) -> Option<&str> {
        self.kubernetes_resources
            .as_ref()
            .and_then(|r| r.version.as_ref())
            .and_then(|v| v.status.as_deref())
            .filter(|s| !s.is_empty())
    }
}

impl TenantControlPlane {
    /// Re-type an object listed through the untyped API.
    pub fn from_dynamic(object: &DynamicObject) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(object)?)
    }

    pub fn to_dynamic(&self) -> Result<DynamicObject, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    #[test]
    fn test_resource_identity() {
        assert_eq!(TenantControlPlane::kind(&()), "TenantControlPlane");
        assert_eq!(TenantControlPlane::group(&()), "kamaji.clastix.io");
        assert_eq!(TenantControlPlane::plural(&()), "tenantcontrolplanes");
    }

    #[test]
    fn test_status_phase_from_backend_json() {
        let status: TenantControlPlaneStatus = serde_json::from_value(serde_json::json!({
            "kubernetesResources": {
                "version": { "version": "v1.30.0", "status": "Ready" }
            },
            "controlPlaneEndpoint": "10.0.0.1:6443",
            "storage": { "driver": "etcd" }
        }))
        .unwrap();
        assert_eq!(status.phase(), Some("Ready"));
    }

    #[test]
    fn test_status_without_version_has_no_phase() {
        assert_eq!(TenantControlPlaneStatus::default().phase(), None);
        let status: TenantControlPlaneStatus = serde_json::from_value(serde_json::json!({
            "kubernetesResources": { "version": { "status": "" } }
        }))
        .unwrap();
        assert_eq!(status.phase(), None);
    }

    #[test]
    fn test_addons_use_kamaji_field_names() {
        let addons = AddonsSpec {
            core_dns: Some(AddonSpec {}),
            kube_proxy: Some(AddonSpec {}),
            konnectivity: Some(KonnectivitySpec {
                server: KonnectivityServerSpec { port: 8132 },
            }),
        };
        let json = serde_json::to_value(&addons).unwrap();
        assert!(json.get("coreDNS").is_some());
        assert!(json.get("kubeProxy").is_some());
        assert_eq!(json["konnectivity"]["server"]["port"], 8132);
    }

    #[test]
    fn test_dynamic_object_without_spec_does_not_type() {
        let object: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "kamaji.clastix.io/v1alpha1",
            "kind": "TenantControlPlane",
            "metadata": { "name": "tcp-broken" }
        }))
        .unwrap();
        assert!(TenantControlPlane::from_dynamic(&object).is_err());
    }
}

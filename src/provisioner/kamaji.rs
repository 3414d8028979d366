//! Kamaji-backed tenant control planes
//!
//! Each tenant cluster is one `TenantControlPlane` named after its id, with
//! the region and id carried as labels. Status is never cached: every read
//! maps whatever the Kamaji controller last published.
//!
//! Several regions may share one management cluster, and other tools may
//! create control planes in the same namespace. Reads and deletes only ever
//! touch resources labelled as managed by fleetplane for the requested
//! region; anything else is invisible.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use tracing::{info, warn};

use super::TenantProvisioner;
use crate::backend::{ManagementClient, TENANT_CLUSTER_KIND};
use crate::crd::{
    AddonSpec, AddonsSpec, ComponentsResources, ControlPlaneSpec, DeploymentSpec,
    KonnectivityServerSpec, KonnectivitySpec, KubeletSpec, KubernetesSpec, NetworkProfileSpec,
    ServiceSpec, TenantControlPlane, TenantControlPlaneSpec,
};
use crate::error::{Error, Result};
use crate::id;
use crate::model::{
    ClusterList, TenantCluster, TenantClusterSpec, TenantClusterStatus, PHASE_PENDING,
    REGION_LABEL,
};
use crate::version::KubeVersion;

pub const CLUSTER_ID_LABEL: &str = "fleetplane.io/cluster-id";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "fleetplane";
const CONTROL_PLANE_REPLICAS: i32 = 2;
const SERVICE_TYPE: &str = "LoadBalancer";
const API_SERVER_PORT: i32 = 6443;
const KONNECTIVITY_PORT: i32 = 8132;
const KUBELET_CGROUP_DRIVER: &str = "systemd";

pub struct KamajiProvisioner {
    namespace: String,
    min_version: KubeVersion,
}

impl KamajiProvisioner {
    pub fn new(namespace: &str, min_version: KubeVersion) -> Self {
        Self {
            namespace: namespace.to_string(),
            min_version,
        }
    }
}

#[async_trait]
impl TenantProvisioner for KamajiProvisioner {
    fn validate(&self, spec: &TenantClusterSpec) -> Result<()> {
        spec.validate(&self.min_version)?;
        if spec.kubeconfig.is_some() {
            return Err(Error::invalid(
                "kubeconfig field is not supported when provisioning with kamaji",
            ));
        }
        Ok(())
    }

    async fn create(
        &self,
        client: &dyn ManagementClient,
        spec: TenantClusterSpec,
    ) -> Result<TenantCluster> {
        self.validate(&spec)?;

        let id = id::tenant_cluster_id();
        let tcp = build_control_plane(&id, &spec, &self.namespace);
        client.create_control_plane(&tcp).await?;

        info!(
            region = %spec.region,
            id = %id,
            version = %spec.version,
            "Submitted tenant control plane"
        );
        Ok(TenantCluster {
            id,
            name: Some(spec.name),
            region: spec.region,
            version: spec.version,
            kubeconfig: None,
            status: TenantClusterStatus::pending(),
        })
    }

    async fn get(
        &self,
        client: &dyn ManagementClient,
        region: &str,
        id: &str,
    ) -> Result<TenantCluster> {
        let tcp = owned_control_plane(client, region, id).await?;
        to_tenant_cluster(&tcp)
    }

    async fn list(&self, client: &dyn ManagementClient, region: &str) -> Result<ClusterList> {
        let mut result = ClusterList::default();
        for object in client.list_control_planes(&selector(region)).await? {
            let name = object.name_any();
            let mapped = TenantControlPlane::from_dynamic(&object)
                .map_err(|e| Error::Internal(format!("cannot decode: {}", e)))
                .and_then(|tcp| to_tenant_cluster(&tcp));
            match mapped {
                Ok(cluster) => result.clusters.push(cluster),
                Err(e) => {
                    warn!(
                        namespace = %self.namespace,
                        name = %name,
                        "Skipping tenant control plane: {}",
                        e
                    );
                    result.warnings.push(format!("{}: {}", name, e));
                }
            }
        }
        Ok(result)
    }

    async fn delete(&self, client: &dyn ManagementClient, region: &str, id: &str) -> Result<()> {
        owned_control_plane(client, region, id).await?;
        client.delete_control_plane(id).await?;
        info!(region = %region, id = %id, "Requested tenant control plane deletion");
        Ok(())
    }
}

/// Label selector for the control planes fleetplane manages in `region`
fn selector(region: &str) -> String {
    format!("{}={},{}={}", MANAGED_BY_LABEL, MANAGED_BY, REGION_LABEL, region)
}

fn is_owned(tcp: &TenantControlPlane, region: &str) -> bool {
    let labels = tcp.labels();
    labels.get(MANAGED_BY_LABEL).map(String::as_str) == Some(MANAGED_BY)
        && labels.get(REGION_LABEL).map(String::as_str) == Some(region)
}

/// Fetch `id`, reporting NotFound for resources of another region or owner.
async fn owned_control_plane(
    client: &dyn ManagementClient,
    region: &str,
    id: &str,
) -> Result<TenantControlPlane> {
    let tcp = client.get_control_plane(id).await?;
    if !is_owned(&tcp, region) {
        return Err(Error::not_found(TENANT_CLUSTER_KIND, id));
    }
    Ok(tcp)
}

fn labels(id: &str, region: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(REGION_LABEL.to_string(), region.to_string());
    labels.insert(CLUSTER_ID_LABEL.to_string(), id.to_string());
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
    labels
}

/// The `TenantControlPlane` submitted for a new tenant cluster
pub(crate) fn build_control_plane(
    id: &str,
    spec: &TenantClusterSpec,
    namespace: &str,
) -> TenantControlPlane {
    TenantControlPlane {
        metadata: ObjectMeta {
            name: Some(id.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels(id, &spec.region)),
            ..Default::default()
        },
        spec: TenantControlPlaneSpec {
            control_plane: ControlPlaneSpec {
                deployment: DeploymentSpec {
                    replicas: CONTROL_PLANE_REPLICAS,
                    resources: ComponentsResources::default(),
                },
                service: ServiceSpec {
                    service_type: SERVICE_TYPE.to_string(),
                },
            },
            kubernetes: KubernetesSpec {
                version: spec.version.clone(),
                kubelet: KubeletSpec {
                    cgroupfs: KUBELET_CGROUP_DRIVER.to_string(),
                },
            },
            network_profile: NetworkProfileSpec {
                port: API_SERVER_PORT,
            },
            addons: AddonsSpec {
                core_dns: Some(AddonSpec {}),
                kube_proxy: Some(AddonSpec {}),
                konnectivity: Some(KonnectivitySpec {
                    server: KonnectivityServerSpec {
                        port: KONNECTIVITY_PORT,
                    },
                }),
            },
        },
        status: None,
    }
}

/// Map an observed `TenantControlPlane` back to the domain.
///
/// The display name is not stored on the resource, so it comes back as
/// `None`.
pub(crate) fn to_tenant_cluster(tcp: &TenantControlPlane) -> Result<TenantCluster> {
    let id = tcp.name_any();
    let region = tcp
        .labels()
        .get(REGION_LABEL)
        .filter(|r| !r.is_empty())
        .cloned()
        .ok_or_else(|| {
            Error::Internal(format!(
                "tenant control plane {} has no {} label",
                id, REGION_LABEL
            ))
        })?;
    let phase = tcp
        .status
        .as_ref()
        .and_then(|s| s.phase())
        .unwrap_or(PHASE_PENDING);

    Ok(TenantCluster {
        id,
        name: None,
        region,
        version: tcp.spec.kubernetes.version.clone(),
        kubeconfig: None,
        status: TenantClusterStatus::from_phase(phase),
    })
}

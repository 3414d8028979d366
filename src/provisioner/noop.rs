use async_trait::async_trait;

use super::TenantProvisioner;
use crate::backend::{ManagementClient, TENANT_CLUSTER_KIND};
use crate::error::{Error, Result};
use crate::id;
use crate::model::{ClusterList, TenantCluster, TenantClusterSpec, TenantClusterStatus};
use crate::version::KubeVersion;

/// Provisioner that never touches a management cluster
///
/// `create` echoes a `Pending` cluster; nothing can be found afterwards.
pub struct NoopProvisioner {
    min_version: KubeVersion,
}

impl NoopProvisioner {
    pub fn new(min_version: KubeVersion) -> Self {
        Self { min_version }
    }
}

#[async_trait]
impl TenantProvisioner for NoopProvisioner {
    fn validate(&self, spec: &TenantClusterSpec) -> Result<()> {
        spec.validate(&self.min_version)
    }

    async fn create(
        &self,
        _client: &dyn ManagementClient,
        spec: TenantClusterSpec,
    ) -> Result<TenantCluster> {
        self.validate(&spec)?;
        Ok(TenantCluster {
            id: id::tenant_cluster_id(),
            name: Some(spec.name),
            region: spec.region,
            version: spec.version,
            kubeconfig: spec.kubeconfig,
            status: TenantClusterStatus::pending(),
        })
    }

    async fn get(
        &self,
        _client: &dyn ManagementClient,
        _region: &str,
        id: &str,
    ) -> Result<TenantCluster> {
        Err(Error::not_found(TENANT_CLUSTER_KIND, id))
    }

    async fn list(&self, _client: &dyn ManagementClient, _region: &str) -> Result<ClusterList> {
        Ok(ClusterList::default())
    }

    async fn delete(&self, _client: &dyn ManagementClient, _region: &str, id: &str) -> Result<()> {
        Err(Error::not_found(TENANT_CLUSTER_KIND, id))
    }
}

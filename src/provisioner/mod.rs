//! Tenant control-plane lifecycle inside a resolved management cluster
//!
//! A provisioner never chooses the management cluster itself: the caller
//! resolves the region and hands over a [`ManagementClient`].

mod kamaji;
mod noop;

use async_trait::async_trait;

use crate::backend::ManagementClient;
use crate::error::Result;
use crate::model::{ClusterList, TenantCluster, TenantClusterSpec};

pub use kamaji::{KamajiProvisioner, CLUSTER_ID_LABEL, MANAGED_BY, MANAGED_BY_LABEL};
pub use noop::NoopProvisioner;

#[cfg(test)]
pub(crate) use kamaji::build_control_plane;

#[async_trait]
pub trait TenantProvisioner: Send + Sync {
    /// Checks that need no backend; run before the region is resolved.
    fn validate(&self, spec: &TenantClusterSpec) -> Result<()>;

    /// Submit a new tenant control plane. The result is always `Pending`.
    async fn create(
        &self,
        client: &dyn ManagementClient,
        spec: TenantClusterSpec,
    ) -> Result<TenantCluster>;

    /// NotFound unless `id` exists and belongs to `region`.
    async fn get(
        &self,
        client: &dyn ManagementClient,
        region: &str,
        id: &str,
    ) -> Result<TenantCluster>;

    /// Tenant clusters of `region`. Items that cannot be mapped end up in
    /// `warnings`.
    async fn list(&self, client: &dyn ManagementClient, region: &str) -> Result<ClusterList>;

    /// Request deletion; does not wait for teardown. NotFound unless `id`
    /// exists and belongs to `region`.
    async fn delete(&self, client: &dyn ManagementClient, region: &str, id: &str) -> Result<()>;
}

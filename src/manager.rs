//! Entry point of the core
//!
//! [`FleetManager`] gates every operation with the [`Authorizer`], routes
//! tenant-cluster operations to the management cluster of their region and
//! counts outcomes. Dependencies are injected; there is no global state.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{instrument, warn};

use crate::authz::{authorize, Action, Authorizer, ResourceKind, Subject};
use crate::backend::ManagementClient;
use crate::connectivity::ConnectivityValidator;
use crate::error::Result;
use crate::model::{
    ClusterList, ManagementCluster, NewManagementCluster, TenantCluster, TenantClusterSpec,
};
use crate::provisioner::TenantProvisioner;
use crate::registrar::{ClusterRegistrar, StoreRegistrar};
use crate::router::RegionRouter;
use crate::store::CredentialStore;

pub struct FleetManager {
    registrar: Arc<dyn ClusterRegistrar>,
    router: RegionRouter,
    authorizer: Arc<dyn Authorizer>,
    provisioner: Arc<dyn TenantProvisioner>,
}

fn finish<T>(operation: &str, result: Result<T>) -> Result<T> {
    #[cfg(feature = "metrics")]
    crate::metrics::record_operation(operation, &result);
    #[cfg(not(feature = "metrics"))]
    let _ = operation;
    result
}

impl FleetManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        validator: Arc<dyn ConnectivityValidator>,
        authorizer: Arc<dyn Authorizer>,
        provisioner: Arc<dyn TenantProvisioner>,
    ) -> Self {
        let registrar = Arc::new(StoreRegistrar::new(store, validator.clone()));
        Self::with_registrar(registrar, validator, authorizer, provisioner)
    }

    /// Use a registrar other than the store-backed one.
    pub fn with_registrar(
        registrar: Arc<dyn ClusterRegistrar>,
        validator: Arc<dyn ConnectivityValidator>,
        authorizer: Arc<dyn Authorizer>,
        provisioner: Arc<dyn TenantProvisioner>,
    ) -> Self {
        Self {
            router: RegionRouter::new(registrar.clone(), validator),
            registrar,
            authorizer,
            provisioner,
        }
    }

    fn authorize(&self, subject: &Subject, action: Action, resource: ResourceKind) -> Result<()> {
        authorize(self.authorizer.as_ref(), subject, action, resource)
    }

    #[instrument(skip_all, fields(subject = %subject, region = %registration.region))]
    pub async fn create_management_cluster(
        &self,
        subject: &Subject,
        registration: NewManagementCluster,
    ) -> Result<ManagementCluster> {
        let result = async {
            self.authorize(subject, Action::Create, ResourceKind::ManagementCluster)?;
            self.registrar.create(registration).await
        }
        .await;
        finish("create_management_cluster", result)
    }

    #[instrument(skip_all, fields(subject = %subject, region = %region))]
    pub async fn get_management_cluster(
        &self,
        subject: &Subject,
        region: &str,
    ) -> Result<ManagementCluster> {
        let result = async {
            self.authorize(subject, Action::Get, ResourceKind::ManagementCluster)?;
            self.registrar.get(region).await
        }
        .await;
        finish("get_management_cluster", result)
    }

    #[instrument(skip_all, fields(subject = %subject))]
    pub async fn list_management_clusters(
        &self,
        subject: &Subject,
    ) -> Result<Vec<ManagementCluster>> {
        let result = async {
            self.authorize(subject, Action::List, ResourceKind::ManagementCluster)?;
            self.registrar.list().await
        }
        .await;
        finish("list_management_clusters", result)
    }

    #[instrument(skip_all, fields(subject = %subject, id = %id))]
    pub async fn delete_management_cluster(&self, subject: &Subject, id: &str) -> Result<()> {
        let result = async {
            self.authorize(subject, Action::Delete, ResourceKind::ManagementCluster)?;
            self.registrar.delete(id).await
        }
        .await;
        finish("delete_management_cluster", result)
    }

    /// Live client for the management cluster serving `region`
    #[instrument(skip_all, fields(subject = %subject, region = %region))]
    pub async fn resolve(
        &self,
        subject: &Subject,
        region: &str,
    ) -> Result<Arc<dyn ManagementClient>> {
        let result = async {
            self.authorize(subject, Action::Get, ResourceKind::ManagementCluster)?;
            self.router.resolve(region).await
        }
        .await;
        finish("resolve", result)
    }

    /// Validation runs before the region is resolved, so a bad spec never
    /// reaches a management cluster.
    #[instrument(skip_all, fields(subject = %subject, region = %spec.region, version = %spec.version))]
    pub async fn create_cluster(
        &self,
        subject: &Subject,
        spec: TenantClusterSpec,
    ) -> Result<TenantCluster> {
        let result = async {
            self.authorize(subject, Action::Create, ResourceKind::Cluster)?;
            self.provisioner.validate(&spec)?;
            let client = self.router.resolve(&spec.region).await?;
            self.provisioner.create(client.as_ref(), spec).await
        }
        .await;
        finish("create_cluster", result)
    }

    #[instrument(skip_all, fields(subject = %subject, region = %region, id = %id))]
    pub async fn get_cluster(
        &self,
        subject: &Subject,
        region: &str,
        id: &str,
    ) -> Result<TenantCluster> {
        let result = async {
            self.authorize(subject, Action::Get, ResourceKind::Cluster)?;
            let client = self.router.resolve(region).await?;
            self.provisioner.get(client.as_ref(), region, id).await
        }
        .await;
        finish("get_cluster", result)
    }

    #[instrument(skip_all, fields(subject = %subject, region = %region))]
    pub async fn list_clusters(&self, subject: &Subject, region: &str) -> Result<ClusterList> {
        let result = async {
            self.authorize(subject, Action::List, ResourceKind::Cluster)?;
            let client = self.router.resolve(region).await?;
            self.provisioner.list(client.as_ref(), region).await
        }
        .await;
        finish("list_clusters", result)
    }

    #[instrument(skip_all, fields(subject = %subject, region = %region, id = %id))]
    pub async fn delete_cluster(&self, subject: &Subject, region: &str, id: &str) -> Result<()> {
        let result = async {
            self.authorize(subject, Action::Delete, ResourceKind::Cluster)?;
            let client = self.router.resolve(region).await?;
            self.provisioner.delete(client.as_ref(), region, id).await
        }
        .await;
        finish("delete_cluster", result)
    }

    /// Tenant clusters of every registered region.
    ///
    /// A region that cannot be reached contributes a warning instead of
    /// failing the whole listing.
    #[instrument(skip_all, fields(subject = %subject))]
    pub async fn list_all_clusters(&self, subject: &Subject) -> Result<ClusterList> {
        let result = async {
            self.authorize(subject, Action::List, ResourceKind::Cluster)?;
            self.collect_all_clusters().await
        }
        .await;
        finish("list_all_clusters", result)
    }

    async fn collect_all_clusters(&self) -> Result<ClusterList> {
        let registrations = self.registrar.list().await?;
        let listings = join_all(registrations.iter().map(|r| async move {
            let listing = match self.router.client_for(r).await {
                Ok(client) => self.provisioner.list(client.as_ref(), &r.region).await,
                Err(e) => Err(e),
            };
            (r.region.as_str(), listing)
        }))
        .await;

        let mut all = ClusterList::default();
        for (region, listing) in listings {
            match listing {
                Ok(list) => all.merge(ClusterList {
                    clusters: list.clusters,
                    warnings: list
                        .warnings
                        .into_iter()
                        .map(|w| format!("{}: {}", region, w))
                        .collect(),
                }),
                Err(e) => {
                    warn!(region = %region, "Cannot list tenant clusters: {}", e);
                    all.warnings.push(format!("{}: {}", region, e));
                }
            }
        }
        Ok(all)
    }
}

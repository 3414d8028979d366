use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, ApiResource, DeleteParams, ListParams, PostParams};
use kube::core::DynamicObject;
use kube::Client;
use tracing::debug;

use super::{with_timeout, ManagementClient, TENANT_CLUSTER_KIND};
use crate::crd::TenantControlPlane;
use crate::error::{Error, Result};

/// [`ManagementClient`] over a kube client for one management cluster
#[derive(Clone)]
pub struct KubeManagementClient {
    client: Client,
    namespace: String,
    timeout: Duration,
}

impl KubeManagementClient {
    pub fn new(client: Client, namespace: &str, timeout: Duration) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            timeout,
        }
    }

    fn typed(&self) -> Api<TenantControlPlane> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn dynamic(&self) -> Api<DynamicObject> {
        let resource = ApiResource::erase::<TenantControlPlane>(&());
        Api::namespaced_with(self.client.clone(), &self.namespace, &resource)
    }
}

#[async_trait]
impl ManagementClient for KubeManagementClient {
    async fn server_version(&self) -> Result<String> {
        let info = with_timeout(self.timeout, "liveness probe", async {
            self.client
                .apiserver_version()
                .await
                .map_err(|e| Error::from_kube(e, "management cluster", "version"))
        })
        .await?;
        debug!(version = %info.git_version, "Management cluster answered liveness probe");
        Ok(info.git_version)
    }

    async fn create_control_plane(&self, tcp: &TenantControlPlane) -> Result<TenantControlPlane> {
        let name = tcp.metadata.name.clone().unwrap_or_default();
        with_timeout(self.timeout, "create tenant control plane", async {
            self.typed()
                .create(&PostParams::default(), tcp)
                .await
                .map_err(|e| Error::from_kube(e, TENANT_CLUSTER_KIND, &name))
        })
        .await
    }

    async fn get_control_plane(&self, name: &str) -> Result<TenantControlPlane> {
        with_timeout(self.timeout, "get tenant control plane", async {
            self.typed()
                .get(name)
                .await
                .map_err(|e| Error::from_kube(e, TENANT_CLUSTER_KIND, name))
        })
        .await
    }

    async fn list_control_planes(&self, label_selector: &str) -> Result<Vec<DynamicObject>> {
        let params = ListParams::default().labels(label_selector);
        let list = with_timeout(self.timeout, "list tenant control planes", async {
            self.dynamic()
                .list(&params)
                .await
                .map_err(|e| Error::from_kube(e, TENANT_CLUSTER_KIND, &self.namespace))
        })
        .await?;
        Ok(list.items)
    }

    async fn delete_control_plane(&self, name: &str) -> Result<()> {
        with_timeout(self.timeout, "delete tenant control plane", async {
            self.typed()
                .delete(name, &DeleteParams::background())
                .await
                .map(|_| ())
                .map_err(|e| Error::from_kube(e, TENANT_CLUSTER_KIND, name))
        })
        .await
    }
}

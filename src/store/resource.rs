//! Credential store backed by `ClusterRegistration` custom resources

use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ObjectMeta, PostParams};
use kube::{Client, ResourceExt};
use tracing::{info, warn};

use super::{ensure_region_free, CredentialStore, RegionLocks, REGISTRATION_KIND};
use crate::backend::with_timeout;
use crate::crd::{ClusterRegistration, ClusterRegistrationSpec};
use crate::error::{Error, Result};
use crate::id;
use crate::model::{Credential, ManagementCluster, NewManagementCluster, REGION_LABEL};

pub struct ResourceCredentialStore {
    registrations: Api<ClusterRegistration>,
    namespace: String,
    timeout: Duration,
    locks: RegionLocks,
}

impl ResourceCredentialStore {
    pub fn new(client: Client, namespace: &str, timeout: Duration) -> Self {
        Self {
            registrations: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
            timeout,
            locks: RegionLocks::default(),
        }
    }
}

#[async_trait]
impl CredentialStore for ResourceCredentialStore {
    async fn put(&self, record: NewManagementCluster) -> Result<ManagementCluster> {
        let _guard = self.locks.lock(&record.region).await;
        ensure_region_free(self, &record.region).await?;

        let id = id::registration_id();
        let registration = registration_for(&id, &record, &self.namespace);
        let created = with_timeout(self.timeout, "create cluster registration", async {
            self.registrations
                .create(&PostParams::default(), &registration)
                .await
                .map_err(|e| Error::from_kube(e, REGISTRATION_KIND, &id))
        })
        .await?;

        info!(region = %record.region, id = %id, "Stored management cluster registration");
        record_from_registration(&created)
    }

    async fn list(&self) -> Result<Vec<ManagementCluster>> {
        let registrations = with_timeout(self.timeout, "list cluster registrations", async {
            self.registrations
                .list(&Default::default())
                .await
                .map_err(|e| Error::from_kube(e, REGISTRATION_KIND, &self.namespace))
        })
        .await?;

        Ok(registrations
            .items
            .iter()
            .filter_map(|r| match record_from_registration(r) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(
                        namespace = %self.namespace,
                        registration = %r.name_any(),
                        "Skipping malformed cluster registration: {}",
                        e
                    );
                    None
                }
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let name = id::registration_object_name(id);
        with_timeout(self.timeout, "delete cluster registration", async {
            self.registrations
                .delete(&name, &DeleteParams::default())
                .await
                .map_err(|e| Error::from_kube(e, REGISTRATION_KIND, id))
        })
        .await?;

        info!(id = %id, "Deleted management cluster registration");
        Ok(())
    }
}

pub(crate) fn registration_for(
    id: &str,
    record: &NewManagementCluster,
    namespace: &str,
) -> ClusterRegistration {
    ClusterRegistration {
        metadata: ObjectMeta {
            name: Some(id::registration_object_name(id)),
            namespace: Some(namespace.to_string()),
            labels: Some([(REGION_LABEL.to_string(), record.region.clone())].into()),
            ..Default::default()
        },
        spec: ClusterRegistrationSpec {
            display_name: record.name.clone(),
            region: record.region.clone(),
            kubeconfig: record.credential.expose().to_string(),
        },
    }
}

pub(crate) fn record_from_registration(
    registration: &ClusterRegistration,
) -> Result<ManagementCluster> {
    let name = registration.name_any();
    let id = id::id_from_object_name(&name).ok_or_else(|| {
        Error::Internal(format!("cluster registration {} is not named mc-<id>", name))
    })?;
    let spec = &registration.spec;
    if spec.region.is_empty() || spec.kubeconfig.is_empty() {
        return Err(Error::Internal(format!(
            "cluster registration {} has an empty region or kubeconfig",
            name
        )));
    }

    Ok(ManagementCluster {
        id: id.to_string(),
        name: spec.display_name.clone(),
        region: spec.region.clone(),
        credential: Credential::new(spec.kubeconfig.clone()),
        created_at: registration
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|t| t.0),
    })
}

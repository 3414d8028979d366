//! Credential store backed by Kubernetes Secrets
//!
//! Each registration lives in a Secret named `mc-<id>` of type
//! [`MANAGEMENT_CLUSTER_SECRET_TYPE`] with `region` and `kubeconfig` data
//! keys. The display name is kept in an annotation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, ListParams, ObjectMeta, PostParams};
use kube::{Client, ResourceExt};
use tracing::{info, warn};

use super::{ensure_region_free, CredentialStore, RegionLocks, REGISTRATION_KIND};
use crate::backend::with_timeout;
use crate::error::{Error, Result};
use crate::id;
use crate::model::{Credential, ManagementCluster, NewManagementCluster, REGION_LABEL};

/// Secret type marking a management-cluster registration
pub const MANAGEMENT_CLUSTER_SECRET_TYPE: &str = "fleetplane.io/management-cluster";

pub(crate) const DISPLAY_NAME_ANNOTATION: &str = "fleetplane.io/display-name";
const REGION_KEY: &str = "region";
const KUBECONFIG_KEY: &str = "kubeconfig";

pub struct SecretCredentialStore {
    secrets: Api<Secret>,
    namespace: String,
    timeout: Duration,
    locks: RegionLocks,
}

impl SecretCredentialStore {
    pub fn new(client: Client, namespace: &str, timeout: Duration) -> Self {
        Self {
            secrets: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
            timeout,
            locks: RegionLocks::default(),
        }
    }
}

#[async_trait]
impl CredentialStore for SecretCredentialStore {
    async fn put(&self, record: NewManagementCluster) -> Result<ManagementCluster> {
        let _guard = self.locks.lock(&record.region).await;
        ensure_region_free(self, &record.region).await?;

        let id = id::registration_id();
        let secret = secret_for(&id, &record, &self.namespace);
        let created = with_timeout(self.timeout, "create registration secret", async {
            self.secrets
                .create(&PostParams::default(), &secret)
                .await
                .map_err(|e| Error::from_kube(e, REGISTRATION_KIND, &id))
        })
        .await?;

        info!(region = %record.region, id = %id, "Stored management cluster registration");
        record_from_secret(&created)
    }

    async fn list(&self) -> Result<Vec<ManagementCluster>> {
        let params =
            ListParams::default().fields(&format!("type={}", MANAGEMENT_CLUSTER_SECRET_TYPE));
        let secrets = with_timeout(self.timeout, "list registration secrets", async {
            self.secrets
                .list(&params)
                .await
                .map_err(|e| Error::from_kube(e, REGISTRATION_KIND, &self.namespace))
        })
        .await?;

        Ok(secrets
            .items
            .iter()
            .filter_map(|secret| match record_from_secret(secret) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(
                        namespace = %self.namespace,
                        secret = %secret.name_any(),
                        "Skipping malformed registration secret: {}",
                        e
                    );
                    None
                }
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let name = id::registration_object_name(id);
        let secret = with_timeout(self.timeout, "get registration secret", async {
            self.secrets
                .get_opt(&name)
                .await
                .map_err(|e| Error::from_kube(e, REGISTRATION_KIND, id))
        })
        .await?;

        // a Secret of another type with a colliding name is not ours to delete
        match secret {
            Some(s) if s.type_.as_deref() == Some(MANAGEMENT_CLUSTER_SECRET_TYPE) => {}
            _ => return Err(Error::not_found(REGISTRATION_KIND, id)),
        }

        with_timeout(self.timeout, "delete registration secret", async {
            self.secrets
                .delete(&name, &DeleteParams::default())
                .await
                .map_err(|e| Error::from_kube(e, REGISTRATION_KIND, id))
        })
        .await?;

        info!(id = %id, "Deleted management cluster registration");
        Ok(())
    }
}

pub(crate) fn secret_for(id: &str, record: &NewManagementCluster, namespace: &str) -> Secret {
    let mut data = BTreeMap::new();
    data.insert(
        REGION_KEY.to_string(),
        ByteString(record.region.clone().into_bytes()),
    );
    data.insert(
        KUBECONFIG_KEY.to_string(),
        ByteString(record.credential.expose().as_bytes().to_vec()),
    );

    Secret {
        metadata: ObjectMeta {
            name: Some(id::registration_object_name(id)),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                REGION_LABEL.to_string(),
                record.region.clone(),
            )])),
            annotations: Some(BTreeMap::from([(
                DISPLAY_NAME_ANNOTATION.to_string(),
                record.name.clone(),
            )])),
            ..Default::default()
        },
        type_: Some(MANAGEMENT_CLUSTER_SECRET_TYPE.to_string()),
        data: Some(data),
        ..Default::default()
    }
}

pub(crate) fn record_from_secret(secret: &Secret) -> Result<ManagementCluster> {
    let name = secret.name_any();
    if secret.type_.as_deref() != Some(MANAGEMENT_CLUSTER_SECRET_TYPE) {
        return Err(Error::Internal(format!(
            "secret {} is not of type {}",
            name, MANAGEMENT_CLUSTER_SECRET_TYPE
        )));
    }
    let id = id::id_from_object_name(&name)
        .ok_or_else(|| Error::Internal(format!("secret {} is not named mc-<id>", name)))?;

    let field = |key: &str| -> Result<String> {
        let bytes = secret
            .data
            .as_ref()
            .and_then(|d| d.get(key))
            .ok_or_else(|| Error::Internal(format!("{} not found in secret {}", key, name)))?;
        String::from_utf8(bytes.0.clone())
            .map_err(|_| Error::Internal(format!("{} in secret {} is not UTF-8", key, name)))
    };
    let region = field(REGION_KEY)?;
    let kubeconfig = field(KUBECONFIG_KEY)?;

    Ok(ManagementCluster {
        id: id.to_string(),
        name: secret
            .annotations()
            .get(DISPLAY_NAME_ANNOTATION)
            .cloned()
            .unwrap_or_else(|| name.clone()),
        region,
        credential: Credential::new(kubeconfig),
        created_at: secret.metadata.creation_timestamp.as_ref().map(|t| t.0),
    })
}

//! In-process management clusters
//!
//! [`InMemoryCluster`] stores `TenantControlPlane` objects in a map and can
//! be switched unreachable. [`InMemoryConnectivity`] resolves credentials to
//! such clusters. Together they let the whole stack run without an API
//! server, which is what the test suites and `--store memory` development
//! setups rely on.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use kube::core::DynamicObject;
use kube::ResourceExt;

use super::{ManagementClient, TENANT_CLUSTER_KIND};
use crate::connectivity::ConnectivityValidator;
use crate::crd::{KubernetesResourcesStatus, KubernetesVersionStatus, TenantControlPlane};
use crate::error::{Error, Result};
use crate::model::Credential;

pub struct InMemoryCluster {
    version: String,
    objects: Mutex<BTreeMap<String, DynamicObject>>,
    reachable: AtomicBool,
    calls: AtomicUsize,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self {
            version: "v1.30.0".to_string(),
            objects: Mutex::new(BTreeMap::new()),
            reachable: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    /// A cluster that refuses every call, including the liveness probe
    pub fn unreachable() -> Self {
        let cluster = Self::new();
        cluster.set_reachable(false);
        cluster
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of calls received so far, probes included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Store an arbitrary object, bypassing any typing.
    pub fn insert_raw(&self, object: DynamicObject) {
        let name = object.name_any();
        self.objects().insert(name, object);
    }

    /// Simulate the backend controller publishing a phase for `name`.
    pub fn set_phase(&self, name: &str, phase: &str) -> Result<()> {
        let mut objects = self.objects();
        let object = objects
            .get_mut(name)
            .ok_or_else(|| Error::not_found(TENANT_CLUSTER_KIND, name))?;
        let mut tcp = decode(object)?;
        let mut status = tcp.status.unwrap_or_default();
        status.kubernetes_resources = Some(KubernetesResourcesStatus {
            version: Some(KubernetesVersionStatus {
                version: Some(tcp.spec.kubernetes.version.clone()),
                status: Some(phase.to_string()),
            }),
        });
        tcp.status = Some(status);
        *object = encode(&tcp)?;
        Ok(())
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<String, DynamicObject>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::BackendUnavailable(
                "management cluster unreachable: connection refused".to_string(),
            ))
        }
    }
}

fn encode(tcp: &TenantControlPlane) -> Result<DynamicObject> {
    tcp.to_dynamic()
        .map_err(|e| Error::Internal(format!("failed to encode tenant control plane: {}", e)))
}

fn decode(object: &DynamicObject) -> Result<TenantControlPlane> {
    TenantControlPlane::from_dynamic(object)
        .map_err(|e| Error::Internal(format!("failed to decode tenant control plane: {}", e)))
}

/// Equality-based selector matching: every `key=value` term must hold.
fn matches_selector(object: &DynamicObject, selector: &str) -> bool {
    let labels = object.labels();
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
            None => labels.contains_key(term),
        })
}

#[async_trait]
impl ManagementClient for InMemoryCluster {
    async fn server_version(&self) -> Result<String> {
        self.enter()?;
        Ok(self.version.clone())
    }

    async fn create_control_plane(&self, tcp: &TenantControlPlane) -> Result<TenantControlPlane> {
        self.enter()?;
        let name = tcp.name_any();
        let mut objects = self.objects();
        if objects.contains_key(&name) {
            return Err(Error::conflict(TENANT_CLUSTER_KIND, name));
        }
        objects.insert(name, encode(tcp)?);
        Ok(tcp.clone())
    }

    async fn get_control_plane(&self, name: &str) -> Result<TenantControlPlane> {
        self.enter()?;
        let objects = self.objects();
        let object = objects
            .get(name)
            .ok_or_else(|| Error::not_found(TENANT_CLUSTER_KIND, name))?;
        decode(object)
    }

    async fn list_control_planes(&self, label_selector: &str) -> Result<Vec<DynamicObject>> {
        self.enter()?;
        Ok(self
            .objects()
            .values()
            .filter(|object| matches_selector(object, label_selector))
            .cloned()
            .collect())
    }

    async fn delete_control_plane(&self, name: &str) -> Result<()> {
        self.enter()?;
        self.objects()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(TENANT_CLUSTER_KIND, name))
    }
}

/// Resolves credentials to registered [`InMemoryCluster`]s.
///
/// Unknown credentials fail validation as unparsable.
#[derive(Default)]
pub struct InMemoryConnectivity {
    clusters: Mutex<HashMap<String, Arc<InMemoryCluster>>>,
    materialized: AtomicUsize,
}

impl InMemoryConnectivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, credential: &str, cluster: Arc<InMemoryCluster>) {
        self.clusters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(credential.to_string(), cluster);
    }

    /// Number of clients handed out by `materialize`
    pub fn materialized(&self) -> usize {
        self.materialized.load(Ordering::SeqCst)
    }

    fn lookup(&self, credential: &Credential) -> Option<Arc<InMemoryCluster>> {
        self.clusters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(credential.expose())
            .cloned()
    }
}

#[async_trait]
impl ConnectivityValidator for InMemoryConnectivity {
    async fn validate(&self, credential: &Credential) -> Result<()> {
        let cluster = self
            .lookup(credential)
            .ok_or_else(|| Error::invalid("credential is not a valid kubeconfig"))?;
        cluster.server_version().await.map(|_| ())
    }

    async fn materialize(&self, credential: &Credential) -> Result<Arc<dyn ManagementClient>> {
        let cluster = self.lookup(credential).ok_or_else(|| {
            Error::Internal("stored credential cannot be turned into a client".to_string())
        })?;
        self.materialized.fetch_add(1, Ordering::SeqCst);
        Ok(cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_unreachable_cluster_refuses_probe() {
        let cluster = InMemoryCluster::unreachable();
        let err = cluster.server_version().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert_eq!(cluster.calls(), 1);
    }

    #[tokio::test]
    async fn test_connectivity_resolves_registered_credentials() {
        let connectivity = InMemoryConnectivity::new();
        connectivity.register("good", Arc::new(InMemoryCluster::new()));
        connectivity.register("down", Arc::new(InMemoryCluster::unreachable()));

        assert!(connectivity.validate(&Credential::new("good")).await.is_ok());
        assert_eq!(
            connectivity
                .validate(&Credential::new("down"))
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::BackendUnavailable
        );
        assert_eq!(
            connectivity
                .validate(&Credential::new("garbage"))
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidArgument
        );
        assert!(connectivity.materialize(&Credential::new("good")).await.is_ok());
        assert_eq!(connectivity.materialized(), 1);
    }

    #[tokio::test]
    async fn test_list_honours_label_selector() {
        let cluster = InMemoryCluster::new();
        for (name, region) in [("tcp-a", "eu-west"), ("tcp-b", "us-east")] {
            let object: DynamicObject = serde_json::from_value(serde_json::json!({
                "apiVersion": "kamaji.clastix.io/v1alpha1",
                "kind": "TenantControlPlane",
                "metadata": {
                    "name": name,
                    "labels": { "fleetplane.io/region": region, "tier": "gold" }
                }
            }))
            .unwrap();
            cluster.insert_raw(object);
        }

        let eu = cluster
            .list_control_planes("tier=gold,fleetplane.io/region=eu-west")
            .await
            .unwrap();
        assert_eq!(eu.len(), 1);
        assert_eq!(eu[0].name_any(), "tcp-a");
        assert_eq!(cluster.list_control_planes("").await.unwrap().len(), 2);
        assert!(cluster.list_control_planes("tier=silver").await.unwrap().is_empty());
    }
}

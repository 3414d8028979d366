//! Access to a management cluster
//!
//! [`ManagementClient`] is everything the provisioner needs from a
//! management cluster: CRUD on `TenantControlPlane` in one namespace and a
//! liveness probe. [`KubeManagementClient`] talks to a real API server;
//! [`memory`] holds in-process stand-ins.

mod kube_client;
pub mod memory;

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use kube::core::DynamicObject;

use crate::crd::TenantControlPlane;
use crate::error::{Error, Result};

pub use kube_client::KubeManagementClient;

/// Default bound on every call to a management cluster
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Kind used in errors about tenant control-plane resources
pub(crate) const TENANT_CLUSTER_KIND: &str = "tenant cluster";

#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Liveness probe: the API server's git version
    async fn server_version(&self) -> Result<String>;

    async fn create_control_plane(&self, tcp: &TenantControlPlane) -> Result<TenantControlPlane>;

    /// NotFound when no resource carries `name`
    async fn get_control_plane(&self, name: &str) -> Result<TenantControlPlane>;

    /// Raw objects matching `label_selector` (`key=value[,key=value]`), so
    /// that one undecodable item does not fail the listing
    async fn list_control_planes(&self, label_selector: &str) -> Result<Vec<DynamicObject>>;

    /// Request deletion without waiting for the backend to tear down
    async fn delete_control_plane(&self, name: &str) -> Result<()>;
}

/// Run `fut` under `timeout`; expiry becomes [`Error::BackendUnavailable`].
pub async fn with_timeout<T, F>(timeout: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let result = match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::BackendUnavailable(format!(
            "{} timed out after {}s",
            operation,
            timeout.as_secs_f64()
        ))),
    };

    #[cfg(feature = "metrics")]
    crate::metrics::observe_backend_call(operation, started.elapsed().as_secs_f64());
    #[cfg(not(feature = "metrics"))]
    let _ = started;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let value = with_timeout(Duration::from_secs(1), "noop", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = with_timeout::<(), _>(Duration::from_secs(1), "noop", async {
            Err(Error::not_found("tenant cluster", "tcp-x"))
        })
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_with_timeout_expiry_is_backend_unavailable() {
        let err = with_timeout::<(), _>(Duration::from_millis(10), "slow call", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert!(err.to_string().contains("slow call timed out"));
    }
}

//! Region to management-cluster resolution

use std::sync::Arc;

use tracing::debug;

use crate::backend::ManagementClient;
use crate::connectivity::ConnectivityValidator;
use crate::error::{Error, Result};
use crate::model::ManagementCluster;
use crate::registrar::ClusterRegistrar;

/// Turns a region name into a live client for its management cluster.
///
/// A fresh client is built on every call.
pub struct RegionRouter {
    registrar: Arc<dyn ClusterRegistrar>,
    validator: Arc<dyn ConnectivityValidator>,
}

impl RegionRouter {
    pub fn new(
        registrar: Arc<dyn ClusterRegistrar>,
        validator: Arc<dyn ConnectivityValidator>,
    ) -> Self {
        Self {
            registrar,
            validator,
        }
    }

    pub async fn resolve(&self, region: &str) -> Result<Arc<dyn ManagementClient>> {
        let registration = match self.registrar.get(region).await {
            Ok(registration) => registration,
            Err(e) if e.is_not_found() => {
                return Err(Error::not_found("management cluster for region", region))
            }
            Err(e) => return Err(e),
        };
        self.client_for(&registration).await
    }

    /// Client for an already looked-up registration
    pub async fn client_for(
        &self,
        registration: &ManagementCluster,
    ) -> Result<Arc<dyn ManagementClient>> {
        debug!(
            region = %registration.region,
            id = %registration.id,
            "Materializing management cluster client"
        );
        self.validator.materialize(&registration.credential).await
    }
}

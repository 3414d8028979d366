//! Management-cluster registrations
//!
//! [`StoreRegistrar`] composes a [`CredentialStore`] with a
//! [`ConnectivityValidator`]: a credential is stored only once its cluster
//! has answered, and only if its region is still free.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::connectivity::ConnectivityValidator;
use crate::error::{Error, Result};
use crate::id;
use crate::model::{ManagementCluster, NewManagementCluster};
use crate::store::{CredentialStore, REGION_KIND, REGISTRATION_KIND};

#[async_trait]
pub trait ClusterRegistrar: Send + Sync {
    async fn create(&self, registration: NewManagementCluster) -> Result<ManagementCluster>;

    /// Registration serving `region`
    async fn get(&self, region: &str) -> Result<ManagementCluster>;

    async fn list(&self) -> Result<Vec<ManagementCluster>>;

    async fn delete(&self, id: &str) -> Result<()>;
}

pub struct StoreRegistrar {
    store: Arc<dyn CredentialStore>,
    validator: Arc<dyn ConnectivityValidator>,
}

impl StoreRegistrar {
    pub fn new(store: Arc<dyn CredentialStore>, validator: Arc<dyn ConnectivityValidator>) -> Self {
        Self { store, validator }
    }
}

#[async_trait]
impl ClusterRegistrar for StoreRegistrar {
    async fn create(&self, registration: NewManagementCluster) -> Result<ManagementCluster> {
        registration.validate()?;

        // fail fast before probing; the store re-checks under its region lock
        match self.store.get(&registration.region).await {
            Ok(_) => return Err(Error::conflict(REGION_KIND, registration.region)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        self.validator.validate(&registration.credential).await?;
        debug!(region = %registration.region, "Management cluster is reachable");

        let stored = self.store.put(registration).await?;
        info!(
            region = %stored.region,
            id = %stored.id,
            name = %stored.name,
            "Registered management cluster"
        );
        Ok(stored)
    }

    async fn get(&self, region: &str) -> Result<ManagementCluster> {
        self.store.get(region).await
    }

    async fn list(&self) -> Result<Vec<ManagementCluster>> {
        self.store.list().await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id).await?;
        info!(id = %id, "Deregistered management cluster");
        Ok(())
    }
}

/// Registrar that keeps nothing
///
/// `create` answers as if it had stored the record; every lookup misses.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRegistrar;

#[async_trait]
impl ClusterRegistrar for NoopRegistrar {
    async fn create(&self, registration: NewManagementCluster) -> Result<ManagementCluster> {
        registration.validate()?;
        Ok(ManagementCluster {
            id: id::registration_id(),
            name: registration.name,
            region: registration.region,
            credential: registration.credential,
            created_at: None,
        })
    }

    async fn get(&self, region: &str) -> Result<ManagementCluster> {
        Err(Error::not_found(REGION_KIND, region))
    }

    async fn list(&self) -> Result<Vec<ManagementCluster>> {
        Ok(Vec::new())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        Err(Error::not_found(REGISTRATION_KIND, id))
    }
}

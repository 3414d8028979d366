//! Durable storage of management-cluster registrations
//!
//! One record per region. Implementations:
//! - [`SecretCredentialStore`]: one Kubernetes Secret per registration
//! - [`ResourceCredentialStore`]: one `ClusterRegistration` custom resource per registration
//! - [`MemoryCredentialStore`]: process-local map
//!
//! `put` calls for the same region never interleave their uniqueness check
//! and their write: the Kubernetes-backed stores hold a [`RegionLocks`] guard,
//! the memory store holds its map write lock.

mod memory;
mod resource;
mod secret;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use crate::error::{Error, Result};
use crate::model::{ManagementCluster, NewManagementCluster};

pub use memory::MemoryCredentialStore;
pub use resource::ResourceCredentialStore;
pub use secret::{SecretCredentialStore, MANAGEMENT_CLUSTER_SECRET_TYPE};

/// Kind used in NotFound / Conflict errors raised by stores
pub(crate) const REGION_KIND: &str = "region";
pub(crate) const REGISTRATION_KIND: &str = "management cluster";

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new registration, assigning its id.
    ///
    /// Fails with Conflict when the region is already registered.
    async fn put(&self, record: NewManagementCluster) -> Result<ManagementCluster>;

    async fn list(&self) -> Result<Vec<ManagementCluster>>;

    /// Remove the registration with primary key `id`.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Look a registration up by region.
    ///
    /// Records are keyed by id, so this is a scan over `list`; there is one
    /// record per geographic region, a few dozen at most.
    async fn get(&self, region: &str) -> Result<ManagementCluster> {
        self.list()
            .await?
            .into_iter()
            .find(|c| c.region == region)
            .ok_or_else(|| Error::not_found(REGION_KIND, region))
    }
}

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Per-region async locks held across the check-then-write of `put`
///
/// An entry lives only while some caller holds or awaits its lock.
#[derive(Default)]
pub struct RegionLocks {
    locks: Mutex<LockMap>,
}

impl RegionLocks {
    pub async fn lock(&self, region: &str) -> RegionGuard<'_> {
        let lock = self
            .map()
            .entry(region.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        RegionGuard {
            locks: self,
            region: region.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.map().len()
    }
}

/// Held region lock; the map entry is pruned on release when nobody else
/// is waiting for it.
pub struct RegionGuard<'a> {
    locks: &'a RegionLocks,
    region: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RegionGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.map();
        if locks
            .get(&self.region)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.region);
        }
    }
}

/// Shared `put` precondition: the region must be free.
pub(crate) async fn ensure_region_free<S>(store: &S, region: &str) -> Result<()>
where
    S: CredentialStore + ?Sized,
{
    match store.get(region).await {
        Ok(_) => Err(Error::conflict(REGION_KIND, region)),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_region_locks_serialize_same_region() {
        let locks = Arc::new(RegionLocks::default());
        let guard = locks.lock("eu-west").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("eu-west").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_region_locks_are_pruned_on_release() {
        let locks = Arc::new(RegionLocks::default());
        let guard = locks.lock("eu-west").await;
        assert_eq!(locks.tracked(), 1);

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("eu-west").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.tracked(), 0);

        for region in ["us-east", "ap-south", "eu-central"] {
            drop(locks.lock(region).await);
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_region_locks_independent_regions() {
        let locks = RegionLocks::default();
        let _eu = locks.lock("eu-west").await;
        let us = tokio::time::timeout(Duration::from_millis(100), locks.lock("us-east")).await;
        assert!(us.is_ok());
    }
}

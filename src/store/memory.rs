//! Process-local credential store
//!
//! Nothing survives a restart. Used for local development and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CredentialStore, REGION_KIND, REGISTRATION_KIND};
use crate::error::{Error, Result};
use crate::id;
use crate::model::{ManagementCluster, NewManagementCluster};

#[derive(Default)]
pub struct MemoryCredentialStore {
    records: RwLock<BTreeMap<String, ManagementCluster>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn put(&self, record: NewManagementCluster) -> Result<ManagementCluster> {
        // the write lock covers both the uniqueness check and the insert
        let mut records = self.records.write().await;
        if records.values().any(|c| c.region == record.region) {
            return Err(Error::conflict(REGION_KIND, record.region));
        }

        let stored = ManagementCluster {
            id: id::registration_id(),
            name: record.name,
            region: record.region,
            credential: record.credential,
            created_at: Some(Utc::now()),
        };
        records.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<ManagementCluster>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(REGISTRATION_KIND, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::assert_err;

    fn record(region: &str) -> NewManagementCluster {
        NewManagementCluster::new(format!("mc-{}", region), region, "kubeconfig")
    }

    #[tokio::test]
    async fn test_put_get_list_delete() {
        let store = MemoryCredentialStore::new();
        let stored = store.put(record("eu-west")).await.unwrap();
        assert_eq!(stored.id.len(), id::ID_LENGTH);
        assert!(stored.created_at.is_some());

        assert_eq!(store.get("eu-west").await.unwrap().id, stored.id);
        assert_eq!(store.list().await.unwrap().len(), 1);

        store.delete(&stored.id).await.unwrap();
        assert!(store.get("eu-west").await.unwrap_err().is_not_found());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_region_conflicts() {
        let store = MemoryCredentialStore::new();
        store.put(record("eu-west")).await.unwrap();
        let err = store.put(record("eu-west")).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "conflict: region eu-west already exists");
    }

    #[tokio::test]
    async fn test_delete_unknown_id() {
        let store = MemoryCredentialStore::new();
        let err = assert_err!(store.delete("nope").await);
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_concurrent_puts_same_region() {
        let store = Arc::new(MemoryCredentialStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.put(record("us-east")).await })
            })
            .collect();

        let mut ok = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) if e.is_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}

//! End-to-end scenarios against in-process management clusters.

use std::sync::Arc;

use fleetplane::authz::{AllowAll, Subject};
use fleetplane::backend::memory::{InMemoryCluster, InMemoryConnectivity};
use fleetplane::manager::FleetManager;
use fleetplane::model::{NewManagementCluster, TenantClusterSpec};
use fleetplane::provisioner::KamajiProvisioner;
use fleetplane::store::MemoryCredentialStore;
use fleetplane::ErrorKind;

const EU_CREDENTIAL: &str = "kubeconfig-eu-west";
const US_CREDENTIAL: &str = "kubeconfig-us-east";
const DOWN_CREDENTIAL: &str = "kubeconfig-unreachable";

struct Fleet {
    manager: Arc<FleetManager>,
    eu: Arc<InMemoryCluster>,
}

fn fleet() -> Fleet {
    let eu = Arc::new(InMemoryCluster::new());
    let connectivity = Arc::new(InMemoryConnectivity::new());
    connectivity.register(EU_CREDENTIAL, eu.clone());
    connectivity.register(US_CREDENTIAL, Arc::new(InMemoryCluster::new()));
    connectivity.register(DOWN_CREDENTIAL, Arc::new(InMemoryCluster::unreachable()));

    let manager = FleetManager::new(
        Arc::new(MemoryCredentialStore::new()),
        connectivity,
        Arc::new(AllowAll),
        Arc::new(KamajiProvisioner::new("tenants", "v1.28.0".parse().unwrap())),
    );
    Fleet {
        manager: Arc::new(manager),
        eu,
    }
}

async fn register_eu(fleet: &Fleet) -> String {
    fleet
        .manager
        .create_management_cluster(
            &Subject::anonymous(),
            NewManagementCluster::new("paris", "eu-west", EU_CREDENTIAL),
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn unreachable_management_cluster_is_never_registered() {
    let fleet = fleet();
    let subject = Subject::anonymous();

    let err = fleet
        .manager
        .create_management_cluster(
            &subject,
            NewManagementCluster::new("broken", "ap-south", DOWN_CREDENTIAL),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert!(fleet
        .manager
        .list_management_clusters(&subject)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn tenant_cluster_stays_pending_until_backend_reports() {
    let fleet = fleet();
    let subject = Subject::anonymous();
    register_eu(&fleet).await;

    let created = fleet
        .manager
        .create_cluster(&subject, TenantClusterSpec::new("demo", "eu-west", "v1.30.0"))
        .await
        .unwrap();
    assert_eq!(created.status.phase, "Pending");
    assert!(!created.status.online);
    assert_eq!(created.name.as_deref(), Some("demo"));

    let fetched = fleet
        .manager
        .get_cluster(&subject, "eu-west", &created.id)
        .await
        .unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.region, "eu-west");
    assert_eq!(fetched.status.phase, "Pending");
    assert_eq!(fetched.name, None);

    fleet.eu.set_phase(&created.id, "Ready").unwrap();
    let ready = fleet
        .manager
        .get_cluster(&subject, "eu-west", &created.id)
        .await
        .unwrap();
    assert!(ready.status.online);
}

#[tokio::test]
async fn unsupported_version_is_rejected_before_any_backend_call() {
    let fleet = fleet();
    let subject = Subject::anonymous();
    register_eu(&fleet).await;
    let calls_after_registration = fleet.eu.calls();

    let err = fleet
        .manager
        .create_cluster(&subject, TenantClusterSpec::new("old", "eu-west", "v1.20.0"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(fleet.eu.calls(), calls_after_registration);
}

#[tokio::test]
async fn concurrent_registrations_for_one_region() {
    let fleet = fleet();
    let subject = Subject::anonymous();

    let attempts = (0..2).map(|i| {
        let manager = fleet.manager.clone();
        tokio::spawn(async move {
            manager
                .create_management_cluster(
                    &Subject::anonymous(),
                    NewManagementCluster::new(format!("virginia-{}", i), "us-east", US_CREDENTIAL),
                )
                .await
        })
    });
    let mut results = Vec::new();
    for attempt in attempts.collect::<Vec<_>>() {
        results.push(attempt.await.unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::Conflict))
            .count(),
        1
    );
    assert_eq!(
        fleet
            .manager
            .list_management_clusters(&subject)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn deregistered_region_is_gone() {
    let fleet = fleet();
    let subject = Subject::anonymous();
    let id = register_eu(&fleet).await;

    let fetched = fleet
        .manager
        .get_management_cluster(&subject, "eu-west")
        .await
        .unwrap();
    assert_eq!(fetched.id, id);

    fleet
        .manager
        .delete_management_cluster(&subject, &id)
        .await
        .unwrap();
    let err = fleet
        .manager
        .get_management_cluster(&subject, "eu-west")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = fleet
        .manager
        .list_clusters(&subject, "eu-west")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn deleted_tenant_cluster_disappears_from_listing() {
    let fleet = fleet();
    let subject = Subject::anonymous();
    register_eu(&fleet).await;

    let keep = fleet
        .manager
        .create_cluster(&subject, TenantClusterSpec::new("keep", "eu-west", "v1.29.0"))
        .await
        .unwrap();
    let doomed = fleet
        .manager
        .create_cluster(&subject, TenantClusterSpec::new("doomed", "eu-west", "v1.30.1"))
        .await
        .unwrap();

    let listed = fleet.manager.list_clusters(&subject, "eu-west").await.unwrap();
    assert_eq!(listed.clusters.len(), 2);
    assert!(listed.clusters.iter().all(|c| c.region == "eu-west"));

    fleet
        .manager
        .delete_cluster(&subject, "eu-west", &doomed.id)
        .await
        .unwrap();
    let err = fleet
        .manager
        .get_cluster(&subject, "eu-west", &doomed.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let listed = fleet.manager.list_clusters(&subject, "eu-west").await.unwrap();
    let ids: Vec<_> = listed.clusters.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![keep.id.as_str()]);
}

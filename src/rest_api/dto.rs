//! Request and response bodies of the REST API

use serde::{Deserialize, Serialize};

use crate::model::{ManagementCluster, NewManagementCluster, TenantCluster};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

/// Registration request; missing fields are reported by validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterManagementClusterRequest {
    pub name: String,
    pub region: String,
    pub kubeconfig: String,
}

impl From<RegisterManagementClusterRequest> for NewManagementCluster {
    fn from(req: RegisterManagementClusterRequest) -> Self {
        NewManagementCluster::new(req.name, req.region, req.kubeconfig)
    }
}

/// A registration as exposed over HTTP, without its credential
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementClusterResponse {
    pub id: String,
    pub name: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<ManagementCluster> for ManagementClusterResponse {
    fn from(cluster: ManagementCluster) -> Self {
        Self {
            id: cluster.id,
            name: cluster.name,
            region: cluster.region,
            created_at: cluster.created_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ManagementClusterListResponse {
    pub items: Vec<ManagementClusterResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterListResponse {
    pub items: Vec<TenantCluster>,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

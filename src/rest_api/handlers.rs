//! HTTP handlers for the REST API

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::{error, field, instrument, Span};

use crate::authz::Subject;
use crate::error::{Error, ErrorKind};
use crate::manager::FleetManager;
use crate::model::{ClusterList, TenantCluster, TenantClusterSpec};

use super::dto::{
    ClusterListResponse, ErrorResponse, HealthResponse, ManagementClusterListResponse,
    ManagementClusterResponse, RegisterManagementClusterRequest,
};

/// Header carrying the authenticated caller, set by the fronting proxy
pub const SUBJECT_HEADER: &str = "x-remote-user";

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: Error) -> ApiError {
    let kind = err.kind();
    let message = match kind {
        ErrorKind::Internal => {
            error!("Request failed: {}", err);
            "internal error".to_string()
        }
        _ => err.to_string(),
    };
    (
        status_for(kind),
        Json(ErrorResponse::new(kind.as_str(), &message)),
    )
}

/// Unwrap a JSON body, rendering extractor rejections as InvalidArgument.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| api_error(Error::invalid(rejection.body_text())))
}

fn subject(headers: &HeaderMap) -> Subject {
    headers
        .get(SUBJECT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Subject::new)
        .unwrap_or_else(Subject::anonymous)
}

fn cluster_list(list: ClusterList) -> ClusterListResponse {
    ClusterListResponse {
        total: list.clusters.len(),
        items: list.clusters,
        warnings: list.warnings,
    }
}

/// Health check endpoint
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[instrument(skip_all, fields(region = field::Empty))]
pub async fn register_management_cluster(
    State(manager): State<Arc<FleetManager>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterManagementClusterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ManagementClusterResponse>)> {
    let req = json_body(payload)?;
    Span::current().record("region", req.region.as_str());
    let created = manager
        .create_management_cluster(&subject(&headers), req.into())
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[instrument(skip_all)]
pub async fn list_management_clusters(
    State(manager): State<Arc<FleetManager>>,
    headers: HeaderMap,
) -> ApiResult<Json<ManagementClusterListResponse>> {
    let items: Vec<ManagementClusterResponse> = manager
        .list_management_clusters(&subject(&headers))
        .await
        .map_err(api_error)?
        .into_iter()
        .map(Into::into)
        .collect();
    let total = items.len();
    Ok(Json(ManagementClusterListResponse { items, total }))
}

/// Look a registration up by region
#[instrument(skip(manager, headers))]
pub async fn get_management_cluster(
    State(manager): State<Arc<FleetManager>>,
    headers: HeaderMap,
    Path(region): Path<String>,
) -> ApiResult<Json<ManagementClusterResponse>> {
    let cluster = manager
        .get_management_cluster(&subject(&headers), &region)
        .await
        .map_err(api_error)?;
    Ok(Json(cluster.into()))
}

/// Remove a registration by id
#[instrument(skip(manager, headers))]
pub async fn delete_management_cluster(
    State(manager): State<Arc<FleetManager>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    manager
        .delete_management_cluster(&subject(&headers), &id)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, fields(region = field::Empty))]
pub async fn create_cluster(
    State(manager): State<Arc<FleetManager>>,
    headers: HeaderMap,
    payload: Result<Json<TenantClusterSpec>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TenantCluster>)> {
    let spec = json_body(payload)?;
    Span::current().record("region", spec.region.as_str());
    let created = manager
        .create_cluster(&subject(&headers), spec)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Tenant clusters across every region
#[instrument(skip_all)]
pub async fn list_all_clusters(
    State(manager): State<Arc<FleetManager>>,
    headers: HeaderMap,
) -> ApiResult<Json<ClusterListResponse>> {
    let list = manager
        .list_all_clusters(&subject(&headers))
        .await
        .map_err(api_error)?;
    Ok(Json(cluster_list(list)))
}

#[instrument(skip(manager, headers))]
pub async fn list_region_clusters(
    State(manager): State<Arc<FleetManager>>,
    headers: HeaderMap,
    Path(region): Path<String>,
) -> ApiResult<Json<ClusterListResponse>> {
    let list = manager
        .list_clusters(&subject(&headers), &region)
        .await
        .map_err(api_error)?;
    Ok(Json(cluster_list(list)))
}

#[instrument(skip(manager, headers))]
pub async fn get_cluster(
    State(manager): State<Arc<FleetManager>>,
    headers: HeaderMap,
    Path((region, id)): Path<(String, String)>,
) -> ApiResult<Json<TenantCluster>> {
    let cluster = manager
        .get_cluster(&subject(&headers), &region, &id)
        .await
        .map_err(api_error)?;
    Ok(Json(cluster))
}

#[instrument(skip(manager, headers))]
pub async fn delete_cluster(
    State(manager): State<Arc<FleetManager>>,
    headers: HeaderMap,
    Path((region, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    manager
        .delete_cluster(&subject(&headers), &region, &id)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

//! REST API module
//!
//! Thin HTTP rendition of [`FleetManager`](crate::manager::FleetManager):
//! management-cluster registrations and tenant clusters.

mod dto;
mod handlers;
mod server;

pub use dto::{
    ClusterListResponse, ErrorResponse, ManagementClusterListResponse, ManagementClusterResponse,
    RegisterManagementClusterRequest,
};
pub use handlers::SUBJECT_HEADER;
pub use server::{build_router, run_server};

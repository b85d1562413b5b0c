//! # API Handlers
//!
//! HTTP endpoint handlers for the Master CRUD API. Handlers only decode the
//! request and hand it to the [`CrudEngine`](crate::operations::CrudEngine);
//! validation and error shaping happen in the engine.

use crate::models::ServiceInfo;
use axum::response::Json;

pub mod entities;
pub mod health;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

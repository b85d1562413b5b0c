//! Entity lifecycle endpoints.
//!
//! Decoding failures are reported with the same envelope the engine uses, so
//! callers only ever handle one error shape.

use axum::{
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ErrorEnvelope;
use crate::operations::{
    CreateEntityRequest, CreateEntityResponse, DeleteEntityRequest, DeleteEntityResponse,
    DeleteMode, LinkEntityRequest, LinkEntityResponse, QueryEntityRequest, QueryEntityResponse,
    UpdateEntityRequest, UpdateEntityResponse,
};
use crate::server::AppState;

/// Query parameters accepted by the delete endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteEntityParams {
    /// Tenant owning the entity
    #[serde(default)]
    pub tenant_id: String,
    /// hard|soft|archive (default: soft)
    #[serde(default)]
    pub mode: DeleteMode,
    /// Remove relationships touching the entity (default: true)
    pub cascade_relationships: Option<bool>,
    /// Remove the entity's attributes (default: true)
    pub cascade_attributes: Option<bool>,
}

/// Create an entity with its attributes and relationships in one transaction
#[utoipa::path(
    post,
    path = "/api/v2/entities",
    request_body = CreateEntityRequest,
    responses(
        (status = 201, description = "Entity created", body = CreateEntityResponse),
        (status = 400, description = "Invalid request", body = ErrorEnvelope),
        (status = 422, description = "Relationship target could not be resolved", body = ErrorEnvelope)
    ),
    tag = "entities"
)]
pub async fn create_entity(
    State(state): State<AppState>,
    payload: Result<Json<CreateEntityRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateEntityResponse>), ErrorEnvelope> {
    let Json(request) = payload?;
    let response = state.engine.create_entity(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Update columns and attributes of an existing entity
#[utoipa::path(
    patch,
    path = "/api/v2/entities/{id}",
    params(
        ("id" = String, Path, description = "Entity id")
    ),
    request_body = UpdateEntityRequest,
    responses(
        (status = 200, description = "Entity updated", body = UpdateEntityResponse),
        (status = 400, description = "Invalid request", body = ErrorEnvelope),
        (status = 404, description = "Entity not found for tenant", body = ErrorEnvelope)
    ),
    tag = "entities"
)]
pub async fn update_entity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateEntityRequest>, JsonRejection>,
) -> Result<Json<UpdateEntityResponse>, ErrorEnvelope> {
    let Json(mut request) = payload?;
    request.entity_id = id;
    Ok(Json(state.engine.update_entity(request).await?))
}

/// Delete, soft-delete or archive an entity
#[utoipa::path(
    delete,
    path = "/api/v2/entities/{id}",
    params(
        ("id" = String, Path, description = "Entity id"),
        DeleteEntityParams
    ),
    responses(
        (status = 200, description = "Entity removed", body = DeleteEntityResponse),
        (status = 400, description = "Invalid request", body = ErrorEnvelope),
        (status = 404, description = "Entity not found for tenant", body = ErrorEnvelope)
    ),
    tag = "entities"
)]
pub async fn delete_entity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<DeleteEntityParams>, QueryRejection>,
) -> Result<Json<DeleteEntityResponse>, ErrorEnvelope> {
    let Query(params) = params?;
    let request = DeleteEntityRequest {
        cascade_relationships: params.cascade_relationships.unwrap_or(true),
        cascade_attributes: params.cascade_attributes.unwrap_or(true),
        ..DeleteEntityRequest::new(params.tenant_id, id, params.mode)
    };
    Ok(Json(state.engine.delete_entity(request).await?))
}

/// Add a relationship from an existing entity
#[utoipa::path(
    post,
    path = "/api/v2/entities/{id}/relationships",
    params(
        ("id" = String, Path, description = "Source entity id")
    ),
    request_body = LinkEntityRequest,
    responses(
        (status = 201, description = "Relationship created", body = LinkEntityResponse),
        (status = 404, description = "Source entity not found for tenant", body = ErrorEnvelope),
        (status = 422, description = "Target could not be resolved", body = ErrorEnvelope)
    ),
    tag = "entities"
)]
pub async fn link_entity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<LinkEntityRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LinkEntityResponse>), ErrorEnvelope> {
    let Json(mut request) = payload?;
    request.entity_id = id;
    let response = state.engine.link_entity(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Filtered, paginated entity read with optional expansion
#[utoipa::path(
    post,
    path = "/api/v2/entities/query",
    request_body = QueryEntityRequest,
    responses(
        (status = 200, description = "Matching entities", body = QueryEntityResponse),
        (status = 400, description = "Invalid request", body = ErrorEnvelope)
    ),
    tag = "entities"
)]
pub async fn query_entities(
    State(state): State<AppState>,
    payload: Result<Json<QueryEntityRequest>, JsonRejection>,
) -> Result<Json<QueryEntityResponse>, ErrorEnvelope> {
    let Json(request) = payload?;
    Ok(Json(state.engine.query_entities(request).await?))
}

//! # Server Configuration
//!
//! Router, shared state and OpenAPI document for the Master CRUD HTTP API.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::handlers;
use crate::operations::CrudEngine;
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: CrudEngine,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Self {
        let engine = CrudEngine::new(db, &config);
        Self {
            config: Arc::new(config),
            engine,
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health::health))
        .route(
            "/api/v2/performance",
            get(handlers::health::performance_report),
        )
        .route("/api/v2/entities", post(handlers::entities::create_entity))
        .route(
            "/api/v2/entities/query",
            post(handlers::entities::query_entities),
        )
        .route(
            "/api/v2/entities/{id}",
            patch(handlers::entities::update_entity).delete(handlers::entities::delete_entity),
        )
        .route(
            "/api/v2/entities/{id}/relationships",
            post(handlers::entities::link_entity),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(telemetry::trace_context_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .with_context(|| format!("Invalid server address: {}", config.api_bind_addr))?;
    let profile = config.profile.clone();

    let app = create_app(AppState::new(config, db));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health::health,
        crate::handlers::health::performance_report,
        crate::handlers::entities::create_entity,
        crate::handlers::entities::update_entity,
        crate::handlers::entities::delete_entity,
        crate::handlers::entities::link_entity,
        crate::handlers::entities::query_entities,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::entity::Model,
            crate::models::entity::EntityStatus,
            crate::models::attribute::Model,
            crate::models::attribute::FieldType,
            crate::models::relationship::Model,
            crate::operations::AttributeInput,
            crate::operations::RelationshipInput,
            crate::operations::CreateEntityRequest,
            crate::operations::CreateEntityResponse,
            crate::operations::AttributeChanges,
            crate::operations::UpdateEntityRequest,
            crate::operations::AttributeChangeSet,
            crate::operations::UpdateEntityResponse,
            crate::operations::DeleteMode,
            crate::operations::DeletedSummary,
            crate::operations::DeleteEntityResponse,
            crate::operations::LinkEntityRequest,
            crate::operations::LinkEntityResponse,
            crate::operations::QueryEntityRequest,
            crate::operations::AttributeView,
            crate::operations::RelationshipSides,
            crate::operations::EntityResult,
            crate::operations::Pagination,
            crate::operations::QueryEntityResponse,
            crate::operations::HealthStatus,
            crate::operations::HealthReport,
            crate::operations::OperationKind,
            crate::performance::PerformanceBlock,
            crate::performance::PerformanceReport,
            crate::performance::OperationStats,
            crate::performance::Grade,
            crate::error::ErrorEnvelope,
            crate::error::ErrorDetail,
            crate::error::FailurePerformance,
            crate::error::Stage,
        )
    ),
    tags(
        (name = "entities", description = "Entity lifecycle operations"),
        (name = "operations", description = "Health and performance"),
    ),
    info(
        title = "Master CRUD API",
        description = "Atomic entity lifecycle operations over the universal entity store",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;

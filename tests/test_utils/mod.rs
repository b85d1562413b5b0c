//! Test utilities for database testing.
//!
//! Sets up in-memory SQLite stores with migrations applied and builds
//! engines and requests used across the integration suites.

use anyhow::Result;
use master_crud::{
    config::{AppConfig, PerformanceConfig},
    db,
    models::{Attribute, CoreEntity, Relationship, attribute, entity, relationship},
    operations::{AttributeData, CreateEntityRequest, CrudEngine},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::Value;
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = db::init_pool(&AppConfig::default()).await?;
    db::run_migrations(&db).await?;
    Ok(db)
}

/// Engine over a fresh store with default budgets.
#[allow(dead_code)]
pub async fn test_engine() -> Result<CrudEngine> {
    test_engine_with(PerformanceConfig::default()).await
}

/// Engine over a fresh store with custom budgets and cache settings.
#[allow(dead_code)]
pub async fn test_engine_with(performance: PerformanceConfig) -> Result<CrudEngine> {
    let config = AppConfig {
        profile: "test".to_string(),
        performance,
        ..AppConfig::default()
    };
    let db = setup_test_db().await?;
    Ok(CrudEngine::new(db, &config))
}

/// A fresh tenant identifier.
#[allow(dead_code)]
pub fn new_tenant() -> Uuid {
    Uuid::new_v4()
}

/// Minimal create request for `entity_type` with map-form attributes.
#[allow(dead_code)]
pub fn create_request(
    tenant_id: Uuid,
    entity_type: &str,
    entity_name: &str,
    attributes: Value,
) -> CreateEntityRequest {
    CreateEntityRequest {
        tenant_id: tenant_id.to_string(),
        entity_type: entity_type.to_string(),
        entity_name: entity_name.to_string(),
        attributes: attributes.as_object().cloned().map(AttributeData::Map),
        ..Default::default()
    }
}

/// Row counts for one tenant: (entities, attributes, relationships).
#[allow(dead_code)]
pub async fn row_counts(db: &DatabaseConnection, tenant_id: Uuid) -> Result<(u64, u64, u64)> {
    let entities = CoreEntity::find()
        .filter(entity::Column::TenantId.eq(tenant_id))
        .count(db)
        .await?;
    let attributes = Attribute::find()
        .filter(attribute::Column::TenantId.eq(tenant_id))
        .count(db)
        .await?;
    let relationships = Relationship::find()
        .filter(relationship::Column::TenantId.eq(tenant_id))
        .count(db)
        .await?;
    Ok((entities, attributes, relationships))
}

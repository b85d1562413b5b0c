//! Entity model
//!
//! SeaORM model for the `core_entities` table. One row per business object,
//! scoped by tenant and partitioned by `entity_type`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

/// Generic entity row representing one business object of any type
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "core_entities")]
#[schema(as = EntityRecord)]
pub struct Model {
    /// Unique identifier for the entity (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant identifier for multi-tenancy
    pub tenant_id: Uuid,

    /// Free-form category (customer, product, appointment, ...)
    pub entity_type: String,

    /// Display name
    pub entity_name: String,

    /// Optional business code
    pub entity_code: Option<String>,

    /// Optional long description
    pub entity_description: Option<String>,

    /// Optional parent entity for hierarchies (same tenant)
    pub parent_entity_id: Option<Uuid>,

    /// Taxonomy tag, e.g. `HERA.CRM.CUSTOMER.ENTITY.PROFILE.V1`
    pub smart_code: String,

    /// Lifecycle status (active|archived|deleted)
    pub status: String,

    /// Free-form tags (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary", nullable)]
    #[schema(value_type = Option<Object>)]
    pub tags: Option<JsonValue>,

    /// Opaque metadata
    #[sea_orm(column_type = "JsonBinary", nullable)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<JsonValue>,

    /// Business rule blob
    #[sea_orm(column_type = "JsonBinary", nullable)]
    #[schema(value_type = Option<Object>)]
    pub business_rules: Option<JsonValue>,

    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,

    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,

    /// Actor that created the row
    pub created_by: Option<String>,

    /// Actor that last updated the row
    pub updated_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Lifecycle status of an entity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Active,
    Archived,
    Deleted,
}

impl EntityStatus {
    pub const ALL: [EntityStatus; 3] = [Self::Active, Self::Archived, Self::Deleted];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Active => "active",
            EntityStatus::Archived => "archived",
            EntityStatus::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

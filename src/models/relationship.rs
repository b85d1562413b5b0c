//! Relationship model
//!
//! SeaORM model for the `core_relationships` table: typed, directed links
//! between two entities of the same tenant.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

/// Typed, directed link between two entities
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "core_relationships")]
#[schema(as = RelationshipRecord)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant identifier; both endpoints belong to this tenant
    pub tenant_id: Uuid,

    /// Source entity
    pub from_entity_id: Uuid,

    /// Target entity
    pub to_entity_id: Uuid,

    /// Free-form relationship type (e.g. `customer_of`, `parent_of`)
    pub relationship_type: String,

    pub smart_code: Option<String>,

    /// Direction hint (forward|backward|bidirectional)
    pub relationship_direction: String,

    /// Strength / weight of the link
    pub relationship_strength: f64,

    pub status: String,

    #[schema(value_type = Option<String>, format = DateTime)]
    pub effective_date: Option<DateTimeWithTimeZone>,

    #[schema(value_type = Option<String>, format = DateTime)]
    pub expiration_date: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<JsonValue>,

    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,

    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,

    pub created_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! # Relationship Repository
//!
//! Tenant-scoped data access for `core_relationships`.

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::models::relationship::{self, ActiveModel, Entity as Relationship, Model};

/// Which side of a relationship an entity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Entity is the target (`to_entity_id`)
    Incoming,
    /// Entity is the source (`from_entity_id`)
    Outgoing,
}

/// A validated, fully resolved relationship ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipWrite {
    pub from_entity_id: Uuid,
    pub to_entity_id: Uuid,
    pub relationship_type: String,
    pub smart_code: Option<String>,
    pub direction: String,
    pub strength: f64,
    pub status: String,
    pub effective_date: Option<DateTime<FixedOffset>>,
    pub expiration_date: Option<DateTime<FixedOffset>>,
    pub metadata: Option<serde_json::Value>,
    pub created_by: Option<String>,
}

/// Repository for relationship rows
pub struct RelationshipRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> RelationshipRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Inserts one relationship row for a tenant
    pub async fn insert(
        &self,
        tenant_id: Uuid,
        write: RelationshipWrite,
    ) -> Result<Model, sea_orm::DbErr> {
        let now = Utc::now();
        ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            from_entity_id: Set(write.from_entity_id),
            to_entity_id: Set(write.to_entity_id),
            relationship_type: Set(write.relationship_type),
            smart_code: Set(write.smart_code),
            relationship_direction: Set(write.direction),
            relationship_strength: Set(write.strength),
            status: Set(write.status),
            effective_date: Set(write.effective_date),
            expiration_date: Set(write.expiration_date),
            metadata: Set(write.metadata),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            created_by: Set(write.created_by),
        }
        .insert(self.db)
        .await
    }

    /// Deletes every relationship where the entity is source or target
    pub async fn delete_for_entity(
        &self,
        tenant_id: Uuid,
        entity_id: Uuid,
    ) -> Result<u64, sea_orm::DbErr> {
        let result = Relationship::delete_many()
            .filter(relationship::Column::TenantId.eq(tenant_id))
            .filter(
                Condition::any()
                    .add(relationship::Column::FromEntityId.eq(entity_id))
                    .add(relationship::Column::ToEntityId.eq(entity_id)),
            )
            .exec(self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Lists one side of an entity's relationships, optionally by type
    pub async fn list_for_entity(
        &self,
        tenant_id: Uuid,
        entity_id: Uuid,
        side: Side,
        types: Option<&[String]>,
    ) -> Result<Vec<Model>, sea_orm::DbErr> {
        let endpoint = match side {
            Side::Incoming => relationship::Column::ToEntityId,
            Side::Outgoing => relationship::Column::FromEntityId,
        };

        let mut query = Relationship::find()
            .filter(relationship::Column::TenantId.eq(tenant_id))
            .filter(endpoint.eq(entity_id));

        if let Some(types) = types {
            query = query.filter(relationship::Column::RelationshipType.is_in(types.iter().cloned()));
        }

        query
            .order_by_asc(relationship::Column::CreatedAt)
            .order_by_asc(relationship::Column::Id)
            .all(self.db)
            .await
    }
}

//! # Attribute Repository
//!
//! Tenant-scoped data access for `core_dynamic_data`, including the
//! (tenant, entity, field_name) keyed upsert.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::models::attribute::{self, ActiveModel, Entity as Attribute, FieldValue, Model};

/// A validated attribute ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeWrite {
    pub field_name: String,
    pub value: FieldValue,
    pub smart_code: Option<String>,
    pub validation_rules: Option<serde_json::Value>,
    pub is_required: bool,
    pub is_searchable: bool,
    pub display_order: Option<i32>,
}

impl AttributeWrite {
    pub fn new(field_name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            field_name: field_name.into(),
            value,
            smart_code: None,
            validation_rules: None,
            is_required: false,
            is_searchable: true,
            display_order: None,
        }
    }

    fn apply(self, active: &mut ActiveModel) {
        active.field_name = Set(self.field_name);
        active.smart_code = Set(self.smart_code);
        active.validation_rules = Set(self.validation_rules);
        active.is_required = Set(self.is_required);
        active.is_searchable = Set(self.is_searchable);
        active.display_order = Set(self.display_order);
        self.value.apply_to(active);
    }
}

/// Repository for attribute rows
pub struct AttributeRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> AttributeRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Inserts a new attribute row for an entity
    pub async fn insert(
        &self,
        tenant_id: Uuid,
        entity_id: Uuid,
        write: AttributeWrite,
    ) -> Result<Model, sea_orm::DbErr> {
        let now = Utc::now();
        let mut active = ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            entity_id: Set(entity_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        write.apply(&mut active);
        active.insert(self.db).await
    }

    /// Finds the attribute row for one field of an entity
    pub async fn find_field(
        &self,
        tenant_id: Uuid,
        entity_id: Uuid,
        field_name: &str,
    ) -> Result<Option<Model>, sea_orm::DbErr> {
        Attribute::find()
            .filter(attribute::Column::TenantId.eq(tenant_id))
            .filter(attribute::Column::EntityId.eq(entity_id))
            .filter(attribute::Column::FieldName.eq(field_name))
            .one(self.db)
            .await
    }

    /// Inserts or updates the row keyed by (tenant, entity, field_name)
    pub async fn upsert(
        &self,
        tenant_id: Uuid,
        entity_id: Uuid,
        write: AttributeWrite,
    ) -> Result<Model, sea_orm::DbErr> {
        match self.find_field(tenant_id, entity_id, &write.field_name).await? {
            Some(existing) => {
                let mut active = existing.into_active_model();
                write.apply(&mut active);
                active.updated_at = Set(Utc::now().into());
                active.update(self.db).await
            }
            None => self.insert(tenant_id, entity_id, write).await,
        }
    }

    /// Deletes the named fields; returns the ids of the removed rows
    pub async fn delete_fields(
        &self,
        tenant_id: Uuid,
        entity_id: Uuid,
        field_names: &[String],
    ) -> Result<Vec<Uuid>, sea_orm::DbErr> {
        if field_names.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = Attribute::find()
            .select_only()
            .column(attribute::Column::Id)
            .filter(attribute::Column::TenantId.eq(tenant_id))
            .filter(attribute::Column::EntityId.eq(entity_id))
            .filter(attribute::Column::FieldName.is_in(field_names.iter().cloned()))
            .order_by_asc(attribute::Column::FieldName)
            .into_tuple()
            .all(self.db)
            .await?;

        if ids.is_empty() {
            return Ok(ids);
        }

        Attribute::delete_many()
            .filter(attribute::Column::TenantId.eq(tenant_id))
            .filter(attribute::Column::Id.is_in(ids.clone()))
            .exec(self.db)
            .await?;

        Ok(ids)
    }

    /// Deletes every attribute owned by an entity; returns the row count
    pub async fn delete_for_entity(
        &self,
        tenant_id: Uuid,
        entity_id: Uuid,
    ) -> Result<u64, sea_orm::DbErr> {
        let result = Attribute::delete_many()
            .filter(attribute::Column::TenantId.eq(tenant_id))
            .filter(attribute::Column::EntityId.eq(entity_id))
            .exec(self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Lists an entity's attributes, optionally restricted to `fields`
    pub async fn list_for_entity(
        &self,
        tenant_id: Uuid,
        entity_id: Uuid,
        fields: Option<&[String]>,
    ) -> Result<Vec<Model>, sea_orm::DbErr> {
        let mut query = Attribute::find()
            .filter(attribute::Column::TenantId.eq(tenant_id))
            .filter(attribute::Column::EntityId.eq(entity_id));

        if let Some(fields) = fields {
            query = query.filter(attribute::Column::FieldName.is_in(fields.iter().cloned()));
        }

        query
            .order_by_asc(attribute::Column::DisplayOrder)
            .order_by_asc(attribute::Column::FieldName)
            .all(self.db)
            .await
    }
}

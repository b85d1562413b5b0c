//! # Entity Repository
//!
//! Tenant-scoped data access for `core_entities`. Every method filters on the
//! tenant; there is no unscoped lookup.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use uuid::Uuid;

use crate::models::entity::{self, ActiveModel, Entity as CoreEntity, EntityStatus, Model};

/// Sortable entity columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    CreatedAt,
    UpdatedAt,
    EntityName,
    EntityType,
    EntityCode,
    SmartCode,
}

impl OrderField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            "entity_name" => Some(Self::EntityName),
            "entity_type" => Some(Self::EntityType),
            "entity_code" => Some(Self::EntityCode),
            "smart_code" => Some(Self::SmartCode),
            _ => None,
        }
    }

    fn column(&self) -> entity::Column {
        match self {
            OrderField::CreatedAt => entity::Column::CreatedAt,
            OrderField::UpdatedAt => entity::Column::UpdatedAt,
            OrderField::EntityName => entity::Column::EntityName,
            OrderField::EntityType => entity::Column::EntityType,
            OrderField::EntityCode => entity::Column::EntityCode,
            OrderField::SmartCode => entity::Column::SmartCode,
        }
    }
}

/// Filter for a paginated entity search. Empty lists other than `ids` mean
/// "no constraint".
#[derive(Debug, Clone)]
pub struct EntityFilter {
    pub tenant_id: Uuid,
    /// `None` leaves ids unconstrained; an empty list matches nothing
    pub ids: Option<Vec<Uuid>>,
    pub entity_types: Vec<String>,
    pub smart_codes: Vec<String>,
    /// When empty, deleted rows are excluded
    pub statuses: Vec<EntityStatus>,
    pub order_by: OrderField,
    pub descending: bool,
    pub limit: u64,
    pub offset: u64,
}

impl EntityFilter {
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            ids: None,
            entity_types: Vec::new(),
            smart_codes: Vec::new(),
            statuses: Vec::new(),
            order_by: OrderField::CreatedAt,
            descending: true,
            limit: 100,
            offset: 0,
        }
    }
}

/// Subset of entity columns to change. `None` leaves a column untouched;
/// `Some(None)` on a nullable column clears it.
#[derive(Debug, Clone, Default)]
pub struct EntityChanges {
    pub entity_name: Option<String>,
    pub entity_code: Option<Option<String>>,
    pub entity_description: Option<Option<String>>,
    pub parent_entity_id: Option<Option<Uuid>>,
    pub smart_code: Option<String>,
    pub status: Option<EntityStatus>,
    pub tags: Option<Option<serde_json::Value>>,
    pub metadata: Option<Option<serde_json::Value>>,
    pub business_rules: Option<Option<serde_json::Value>>,
}

impl EntityChanges {
    pub fn is_empty(&self) -> bool {
        self.entity_name.is_none()
            && self.entity_code.is_none()
            && self.entity_description.is_none()
            && self.parent_entity_id.is_none()
            && self.smart_code.is_none()
            && self.status.is_none()
            && self.tags.is_none()
            && self.metadata.is_none()
            && self.business_rules.is_none()
    }

    /// Builds an active model with only the supplied columns set.
    fn into_active_model(self, actor: Option<String>) -> ActiveModel {
        let mut active = ActiveModel {
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        if let Some(name) = self.entity_name {
            active.entity_name = Set(name);
        }
        if let Some(code) = self.entity_code {
            active.entity_code = Set(code);
        }
        if let Some(description) = self.entity_description {
            active.entity_description = Set(description);
        }
        if let Some(parent) = self.parent_entity_id {
            active.parent_entity_id = Set(parent);
        }
        if let Some(smart_code) = self.smart_code {
            active.smart_code = Set(smart_code);
        }
        if let Some(status) = self.status {
            active.status = Set(status.as_str().to_string());
        }
        if let Some(tags) = self.tags {
            active.tags = Set(tags);
        }
        if let Some(metadata) = self.metadata {
            active.metadata = Set(metadata);
        }
        if let Some(rules) = self.business_rules {
            active.business_rules = Set(rules);
        }
        if actor.is_some() {
            active.updated_by = Set(actor);
        }
        active
    }
}

/// Repository for entity rows
pub struct EntityRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> EntityRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Inserts a fully populated entity row
    pub async fn insert(&self, entity: ActiveModel) -> Result<Model, sea_orm::DbErr> {
        entity.insert(self.db).await
    }

    /// Finds an entity by id within a tenant scope
    pub async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Model>, sea_orm::DbErr> {
        CoreEntity::find_by_id(id)
            .filter(entity::Column::TenantId.eq(tenant_id))
            .one(self.db)
            .await
    }

    /// Finds an entity by id within a tenant scope, skipping soft-deleted rows
    pub async fn find_live(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Model>, sea_orm::DbErr> {
        CoreEntity::find_by_id(id)
            .filter(entity::Column::TenantId.eq(tenant_id))
            .filter(entity::Column::Status.ne(EntityStatus::Deleted.as_str()))
            .one(self.db)
            .await
    }

    /// Lists entities carrying `smart_code`, oldest first then by id
    pub async fn find_by_smart_code(
        &self,
        tenant_id: Uuid,
        smart_code: &str,
    ) -> Result<Vec<Model>, sea_orm::DbErr> {
        CoreEntity::find()
            .filter(entity::Column::TenantId.eq(tenant_id))
            .filter(entity::Column::SmartCode.eq(smart_code))
            .filter(entity::Column::Status.ne(EntityStatus::Deleted.as_str()))
            .order_by_asc(entity::Column::CreatedAt)
            .order_by_asc(entity::Column::Id)
            .all(self.db)
            .await
    }

    /// Applies `changes` to one entity; returns the number of rows touched
    pub async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        changes: EntityChanges,
        actor: Option<String>,
    ) -> Result<u64, sea_orm::DbErr> {
        let result = CoreEntity::update_many()
            .set(changes.into_active_model(actor))
            .filter(entity::Column::Id.eq(id))
            .filter(entity::Column::TenantId.eq(tenant_id))
            .exec(self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Flips the lifecycle status of one entity
    pub async fn set_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: EntityStatus,
    ) -> Result<u64, sea_orm::DbErr> {
        let result = CoreEntity::update_many()
            .col_expr(entity::Column::Status, Expr::value(status.as_str()))
            .col_expr(entity::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(entity::Column::Id.eq(id))
            .filter(entity::Column::TenantId.eq(tenant_id))
            .exec(self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Physically removes one entity row
    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<u64, sea_orm::DbErr> {
        let result = CoreEntity::delete_many()
            .filter(entity::Column::Id.eq(id))
            .filter(entity::Column::TenantId.eq(tenant_id))
            .exec(self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Filtered, ordered, paginated search
    pub async fn search(&self, filter: &EntityFilter) -> Result<Vec<Model>, sea_orm::DbErr> {
        let mut condition = Condition::all().add(entity::Column::TenantId.eq(filter.tenant_id));

        match &filter.ids {
            Some(ids) if ids.is_empty() => return Ok(Vec::new()),
            Some(ids) => condition = condition.add(entity::Column::Id.is_in(ids.clone())),
            None => {}
        }
        if !filter.entity_types.is_empty() {
            condition = condition.add(entity::Column::EntityType.is_in(filter.entity_types.clone()));
        }
        if !filter.smart_codes.is_empty() {
            condition = condition.add(entity::Column::SmartCode.is_in(filter.smart_codes.clone()));
        }
        if filter.statuses.is_empty() {
            condition = condition.add(entity::Column::Status.ne(EntityStatus::Deleted.as_str()));
        } else {
            condition = condition.add(
                entity::Column::Status
                    .is_in(filter.statuses.iter().map(|status| status.as_str())),
            );
        }

        let mut query = CoreEntity::find().filter(condition);

        // Order by the requested column, id as a tiebreaker for stable pages
        let column = filter.order_by.column();
        query = if filter.descending {
            query
                .order_by_desc(column)
                .order_by_desc(entity::Column::Id)
        } else {
            query.order_by_asc(column).order_by_asc(entity::Column::Id)
        };

        query
            .limit(filter.limit)
            .offset(filter.offset)
            .all(self.db)
            .await
    }
}

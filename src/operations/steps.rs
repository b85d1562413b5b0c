//! Composer steps shared by the mutation operations.

use async_trait::async_trait;
use sea_orm::DatabaseTransaction;
use tracing::warn;
use uuid::Uuid;

use crate::composer::{Step, StepOutput, StepResults};
use crate::error::CrudError;
use crate::models::entity::{self, EntityStatus};
use crate::repositories::{
    AttributeRepository, AttributeWrite, EntityChanges, EntityRepository, RelationshipRepository,
    RelationshipWrite,
};

use super::types::DeleteMode;

/// Name of the step whose output is the operation's entity.
pub const ENTITY_STEP: &str = "entity";

async fn parent_exists(
    txn: &DatabaseTransaction,
    tenant_id: Uuid,
    parent_id: Uuid,
) -> Result<(), CrudError> {
    match EntityRepository::new(txn).find_live(tenant_id, parent_id).await? {
        Some(_) => Ok(()),
        None => Err(CrudError::validation(
            "parent_entity_id",
            format!("parent entity {parent_id} does not exist in this tenant"),
        )),
    }
}

/// Inserts the entity row after checking its parent, if any.
pub struct InsertEntity {
    pub tenant_id: Uuid,
    pub parent_entity_id: Option<Uuid>,
    pub row: entity::ActiveModel,
}

#[async_trait]
impl Step for InsertEntity {
    async fn run(
        &self,
        txn: &DatabaseTransaction,
        _prior: &StepResults,
    ) -> Result<StepOutput, CrudError> {
        if let Some(parent_id) = self.parent_entity_id {
            parent_exists(txn, self.tenant_id, parent_id).await?;
        }
        let model = EntityRepository::new(txn).insert(self.row.clone()).await?;
        Ok(StepOutput::Entity(model))
    }
}

/// Loads the entity and fails with `ENTITY_NOT_FOUND` when the tenant has no
/// such row.
pub struct LoadEntity {
    pub tenant_id: Uuid,
    pub entity_id: Uuid,
}

#[async_trait]
impl Step for LoadEntity {
    async fn run(
        &self,
        txn: &DatabaseTransaction,
        _prior: &StepResults,
    ) -> Result<StepOutput, CrudError> {
        EntityRepository::new(txn)
            .find(self.tenant_id, self.entity_id)
            .await?
            .map(StepOutput::Entity)
            .ok_or(CrudError::EntityNotFound {
                entity_id: self.entity_id,
                tenant_id: self.tenant_id,
            })
    }
}

/// Writes the supplied subset of entity columns.
pub struct UpdateEntity {
    pub tenant_id: Uuid,
    pub entity_id: Uuid,
    pub changes: EntityChanges,
    pub actor: Option<String>,
}

#[async_trait]
impl Step for UpdateEntity {
    async fn run(
        &self,
        txn: &DatabaseTransaction,
        _prior: &StepResults,
    ) -> Result<StepOutput, CrudError> {
        if let Some(Some(parent_id)) = self.changes.parent_entity_id {
            if parent_id == self.entity_id {
                return Err(CrudError::validation(
                    "parent_entity_id",
                    "an entity cannot be its own parent",
                ));
            }
            parent_exists(txn, self.tenant_id, parent_id).await?;
        }

        let count = EntityRepository::new(txn)
            .update(
                self.tenant_id,
                self.entity_id,
                self.changes.clone(),
                self.actor.clone(),
            )
            .await?;
        Ok(StepOutput::Affected {
            ids: vec![self.entity_id],
            count,
        })
    }
}

/// Inserts one attribute for the entity produced by [`ENTITY_STEP`].
pub struct InsertAttribute {
    pub tenant_id: Uuid,
    pub write: AttributeWrite,
}

#[async_trait]
impl Step for InsertAttribute {
    async fn run(
        &self,
        txn: &DatabaseTransaction,
        prior: &StepResults,
    ) -> Result<StepOutput, CrudError> {
        let entity_id = prior.entity_id(ENTITY_STEP)?;
        let model = AttributeRepository::new(txn)
            .insert(self.tenant_id, entity_id, self.write.clone())
            .await?;
        Ok(StepOutput::Attribute(model))
    }
}

/// Inserts or overwrites one attribute keyed by field name.
pub struct UpsertAttribute {
    pub tenant_id: Uuid,
    pub entity_id: Uuid,
    pub write: AttributeWrite,
}

#[async_trait]
impl Step for UpsertAttribute {
    async fn run(
        &self,
        txn: &DatabaseTransaction,
        _prior: &StepResults,
    ) -> Result<StepOutput, CrudError> {
        let model = AttributeRepository::new(txn)
            .upsert(self.tenant_id, self.entity_id, self.write.clone())
            .await?;
        Ok(StepOutput::Attribute(model))
    }
}

/// Removes the named attributes of one entity.
pub struct DeleteAttributes {
    pub tenant_id: Uuid,
    pub entity_id: Uuid,
    pub field_names: Vec<String>,
}

#[async_trait]
impl Step for DeleteAttributes {
    async fn run(
        &self,
        txn: &DatabaseTransaction,
        _prior: &StepResults,
    ) -> Result<StepOutput, CrudError> {
        let ids = AttributeRepository::new(txn)
            .delete_fields(self.tenant_id, self.entity_id, &self.field_names)
            .await?;
        let count = ids.len() as u64;
        Ok(StepOutput::Affected { ids, count })
    }
}

/// Removes every attribute owned by one entity.
pub struct DeleteAllAttributes {
    pub tenant_id: Uuid,
    pub entity_id: Uuid,
}

#[async_trait]
impl Step for DeleteAllAttributes {
    async fn run(
        &self,
        txn: &DatabaseTransaction,
        _prior: &StepResults,
    ) -> Result<StepOutput, CrudError> {
        let count = AttributeRepository::new(txn)
            .delete_for_entity(self.tenant_id, self.entity_id)
            .await?;
        Ok(StepOutput::Affected {
            ids: Vec::new(),
            count,
        })
    }
}

/// Removes every relationship where the entity is source or target.
pub struct DeleteRelationships {
    pub tenant_id: Uuid,
    pub entity_id: Uuid,
}

#[async_trait]
impl Step for DeleteRelationships {
    async fn run(
        &self,
        txn: &DatabaseTransaction,
        _prior: &StepResults,
    ) -> Result<StepOutput, CrudError> {
        let count = RelationshipRepository::new(txn)
            .delete_for_entity(self.tenant_id, self.entity_id)
            .await?;
        Ok(StepOutput::Affected {
            ids: Vec::new(),
            count,
        })
    }
}

/// Removes the entity row or moves it to a terminal status.
pub struct RetireEntity {
    pub tenant_id: Uuid,
    pub entity_id: Uuid,
    pub mode: DeleteMode,
}

#[async_trait]
impl Step for RetireEntity {
    async fn run(
        &self,
        txn: &DatabaseTransaction,
        _prior: &StepResults,
    ) -> Result<StepOutput, CrudError> {
        let repo = EntityRepository::new(txn);
        let count = match self.mode {
            DeleteMode::Hard => repo.delete(self.tenant_id, self.entity_id).await?,
            DeleteMode::Soft => {
                repo.set_status(self.tenant_id, self.entity_id, EntityStatus::Deleted)
                    .await?
            }
            DeleteMode::Archive => {
                repo.set_status(self.tenant_id, self.entity_id, EntityStatus::Archived)
                    .await?
            }
        };
        Ok(StepOutput::Affected {
            ids: vec![self.entity_id],
            count,
        })
    }
}

/// How a relationship names its target.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetRef {
    Id(Uuid),
    SmartCode(String),
}

/// Resolves the target within the tenant, then inserts the relationship from
/// the entity produced by [`ENTITY_STEP`]. Soft-deleted entities are never
/// valid targets. An unresolved target fails the step and therefore the
/// whole transaction.
pub struct LinkEntity {
    pub tenant_id: Uuid,
    pub index: usize,
    pub target: TargetRef,
    /// Template; endpoints are filled in at run time
    pub write: RelationshipWrite,
}

impl LinkEntity {
    async fn resolve(&self, txn: &DatabaseTransaction) -> Result<Uuid, CrudError> {
        let entities = EntityRepository::new(txn);
        match &self.target {
            TargetRef::Id(id) => match entities.find_live(self.tenant_id, *id).await? {
                Some(target) => Ok(target.id),
                None => Err(CrudError::relationship(
                    format!("relationships[{}].target_entity_id", self.index),
                    format!("target entity {id} does not exist in this tenant"),
                )),
            },
            TargetRef::SmartCode(code) => {
                let matches = entities.find_by_smart_code(self.tenant_id, code).await?;
                match matches.as_slice() {
                    [] => Err(CrudError::relationship(
                        format!("relationships[{}].target_smart_code", self.index),
                        format!("no entity with smart code {code} exists in this tenant"),
                    )),
                    [only] => Ok(only.id),
                    [first, ..] => {
                        warn!(
                            smart_code = %code,
                            match_count = matches.len(),
                            chosen = %first.id,
                            "Smart code matched several entities, linking the oldest"
                        );
                        Ok(first.id)
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Step for LinkEntity {
    async fn run(
        &self,
        txn: &DatabaseTransaction,
        prior: &StepResults,
    ) -> Result<StepOutput, CrudError> {
        let from_entity_id = prior.entity_id(ENTITY_STEP)?;
        let to_entity_id = self.resolve(txn).await?;
        if to_entity_id == from_entity_id {
            return Err(CrudError::relationship(
                format!("relationships[{}]", self.index),
                "an entity cannot be linked to itself",
            ));
        }

        let write = RelationshipWrite {
            from_entity_id,
            to_entity_id,
            ..self.write.clone()
        };
        let model = RelationshipRepository::new(txn)
            .insert(self.tenant_id, write)
            .await?;
        Ok(StepOutput::Relationship(model))
    }
}

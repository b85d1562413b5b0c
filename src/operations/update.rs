//! Update-Entity-Complete: column subset update, attribute upserts and
//! attribute removals in one transaction.

use std::time::Instant;

use uuid::Uuid;

use crate::composer::{StepOutput, TransactionComposer};
use crate::error::{AtStage, CrudError, ErrorEnvelope, OperationFailure, Stage};
use crate::models::entity::EntityStatus;
use crate::repositories::{EntityChanges, EntityRepository};
use crate::validation;

use super::steps::{DeleteAttributes, ENTITY_STEP, LoadEntity, UpdateEntity, UpsertAttribute};
use super::{
    AttributeChangeSet, CrudEngine, OperationKind, UpdateEntityRequest, UpdateEntityResponse,
    attribute_writes, tenant_hint,
};

const DELETE_STEP: &str = "delete_attributes";

struct UpdatePlan {
    tenant_id: Uuid,
    entity_id: Uuid,
    composer: TransactionComposer,
}

impl CrudEngine {
    /// Updates an entity's columns and attributes atomically.
    pub async fn update_entity(
        &self,
        request: UpdateEntityRequest,
    ) -> Result<UpdateEntityResponse, ErrorEnvelope> {
        let started = Instant::now();
        let tenant = tenant_hint(&request.tenant_id);

        match self.run_update(request, started).await {
            Ok(response) => Ok(response),
            Err(failure) => Err(self
                .reject(OperationKind::Update, tenant, started, failure)
                .await),
        }
    }

    async fn run_update(
        &self,
        request: UpdateEntityRequest,
        started: Instant,
    ) -> Result<UpdateEntityResponse, OperationFailure> {
        let UpdatePlan {
            tenant_id,
            entity_id,
            composer,
        } = plan_update(request).at_stage(Stage::Validation)?;

        let store_calls = composer.len() as u32 + 3;
        let results = composer
            .execute(&self.db)
            .await
            .at_stage(Stage::AtomicTransaction)?;

        let mut changes = AttributeChangeSet::default();
        for (name, output) in results.iter() {
            match output {
                StepOutput::Attribute(model) => changes.upserted.push(model.id),
                StepOutput::Affected { ids, .. } if name == DELETE_STEP => {
                    changes.deleted.extend(ids.iter().copied())
                }
                _ => {}
            }
        }

        let entity = EntityRepository::new(&self.db)
            .find(tenant_id, entity_id)
            .await
            .at_stage(Stage::DatabaseOperation)?
            .ok_or(CrudError::EntityNotFound {
                entity_id,
                tenant_id,
            })
            .at_stage(Stage::ResponseMapping)?;

        self.monitor.invalidate_tenant(tenant_id).await;
        let (performance, warnings) = self
            .succeed(OperationKind::Update, tenant_id, started, store_calls, false)
            .await;

        Ok(UpdateEntityResponse {
            success: true,
            entity_id,
            entity,
            changes,
            performance,
            warnings,
        })
    }
}

fn plan_update(request: UpdateEntityRequest) -> Result<UpdatePlan, CrudError> {
    let tenant_id = validation::tenant_id(&request.tenant_id)?;
    let entity_id = validation::entity_id("entity_id", &request.entity_id)?;

    if let Some(name) = request.entity_name.as_deref() {
        validation::entity_name(name)?;
    }
    if let Some(code) = request.smart_code.as_deref() {
        validation::smart_code("smart_code", code)?;
    }

    let status = request
        .status
        .as_deref()
        .map(|raw| {
            EntityStatus::parse(raw).ok_or_else(|| {
                CrudError::validation(
                    "status",
                    format!("status '{raw}' must be active, archived or deleted"),
                )
            })
        })
        .transpose()?;

    let parent_entity_id = match request.parent_entity_id {
        Some(Some(raw)) => Some(Some(validation::entity_id("parent_entity_id", &raw)?)),
        Some(None) => Some(None),
        None => None,
    };

    let changes = EntityChanges {
        entity_name: request.entity_name.map(|name| name.trim().to_string()),
        entity_code: request.entity_code,
        entity_description: request.entity_description,
        parent_entity_id,
        smart_code: request.smart_code,
        status,
        tags: request
            .tags
            .map(|tags| tags.map(|tags| serde_json::json!(tags))),
        metadata: request.metadata,
        business_rules: request.business_rules,
    };

    let attribute_changes = request.attributes.unwrap_or_default();
    let upserts = attribute_writes(
        "attributes.upsert",
        attribute_changes
            .upsert
            .map(|data| data.into_inputs())
            .unwrap_or_default(),
    )?;

    let removals = attribute_changes.delete.unwrap_or_default();
    for (index, field_name) in removals.iter().enumerate() {
        validation::field_name(field_name).map_err(|_| {
            CrudError::validation(
                format!("attributes.delete[{index}]"),
                format!("'{field_name}' is not a valid field name"),
            )
        })?;
        if upserts.iter().any(|write| &write.field_name == field_name) {
            return Err(CrudError::validation(
                format!("attributes.delete[{index}]"),
                format!("field '{field_name}' cannot be both upserted and deleted"),
            ));
        }
    }

    let mut composer = TransactionComposer::new();
    composer.add(
        ENTITY_STEP,
        LoadEntity {
            tenant_id,
            entity_id,
        },
    );
    if !changes.is_empty() {
        composer.add(
            "update_entity",
            UpdateEntity {
                tenant_id,
                entity_id,
                changes,
                actor: request.actor_id,
            },
        );
    }
    for write in upserts {
        composer.add(
            format!("upsert:{}", write.field_name),
            UpsertAttribute {
                tenant_id,
                entity_id,
                write,
            },
        );
    }
    if !removals.is_empty() {
        composer.add(
            DELETE_STEP,
            DeleteAttributes {
                tenant_id,
                entity_id,
                field_names: removals,
            },
        );
    }

    Ok(UpdatePlan {
        tenant_id,
        entity_id,
        composer,
    })
}

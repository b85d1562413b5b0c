//! Create-Entity-Complete: entity, attributes and relationships in one
//! transaction.

use std::time::Instant;

use chrono::Utc;
use sea_orm::Set;
use uuid::Uuid;

use crate::composer::{StepOutput, TransactionComposer};
use crate::config::SmartCodeConfig;
use crate::error::{AtStage, CrudError, OperationFailure, Stage};
use crate::models::entity::{self, EntityStatus};
use crate::repositories::{EntityRepository, RelationshipWrite};
use crate::validation;

use super::steps::{ENTITY_STEP, InsertAttribute, InsertEntity, LinkEntity, TargetRef};
use super::{
    CreateEntityRequest, CreateEntityResponse, CrudEngine, OperationKind, RelationshipInput,
    attribute_writes, tenant_hint,
};

const DIRECTIONS: [&str; 3] = ["forward", "backward", "bidirectional"];

/// A validated create request, ready to execute.
struct CreatePlan {
    tenant_id: Uuid,
    composer: TransactionComposer,
}

impl CrudEngine {
    /// Creates an entity with its attributes and relationships atomically.
    pub async fn create_entity(
        &self,
        request: CreateEntityRequest,
    ) -> Result<CreateEntityResponse, crate::error::ErrorEnvelope> {
        let started = Instant::now();
        let tenant = tenant_hint(&request.tenant_id);

        match self.run_create(request, started).await {
            Ok(response) => Ok(response),
            Err(failure) => Err(self
                .reject(OperationKind::Create, tenant, started, failure)
                .await),
        }
    }

    async fn run_create(
        &self,
        request: CreateEntityRequest,
        started: Instant,
    ) -> Result<CreateEntityResponse, OperationFailure> {
        let CreatePlan {
            tenant_id,
            composer,
        } = plan_create(request, &self.smart_codes).at_stage(Stage::Validation)?;

        // begin + steps + commit + reload
        let store_calls = composer.len() as u32 + 3;
        let results = composer
            .execute(&self.db)
            .await
            .at_stage(Stage::AtomicTransaction)?;

        let entity_id = results
            .entity_id(ENTITY_STEP)
            .at_stage(Stage::ResponseMapping)?;
        let mut created_attribute_ids = Vec::new();
        let mut created_relationship_ids = Vec::new();
        for (_, output) in results.iter() {
            match output {
                StepOutput::Attribute(model) => created_attribute_ids.push(model.id),
                StepOutput::Relationship(model) => created_relationship_ids.push(model.id),
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
            .succeed(OperationKind::Create, tenant_id, started, store_calls, false)
            .await;

        Ok(CreateEntityResponse {
            success: true,
            entity_id,
            entity,
            created_attribute_ids,
            created_relationship_ids,
            performance,
            warnings,
        })
    }
}

/// Validates the whole request and registers one step per row to write.
fn plan_create(
    request: CreateEntityRequest,
    smart_codes: &SmartCodeConfig,
) -> Result<CreatePlan, CrudError> {
    let tenant_id = validation::tenant_id(&request.tenant_id)?;
    validation::entity_type(&request.entity_type)?;
    validation::entity_name(&request.entity_name)?;

    let entity_type = request.entity_type.trim().to_string();
    let smart_code = match request.smart_code {
        Some(code) => {
            validation::smart_code("smart_code", &code)?;
            code
        }
        None => {
            let generated = smart_codes.default_for(&entity_type);
            validation::smart_code("smart_code", &generated)?;
            generated
        }
    };

    let status = match request.status.as_deref() {
        None => EntityStatus::Active,
        Some(raw) => match EntityStatus::parse(raw) {
            Some(EntityStatus::Deleted) => {
                return Err(CrudError::validation(
                    "status",
                    "an entity cannot be created as deleted",
                ));
            }
            Some(status) => status,
            None => {
                return Err(CrudError::validation(
                    "status",
                    format!("status '{raw}' must be active or archived"),
                ));
            }
        },
    };

    let parent_entity_id = request
        .parent_entity_id
        .as_deref()
        .map(|raw| validation::entity_id("parent_entity_id", raw))
        .transpose()?;

    let attributes = attribute_writes(
        "attributes",
        request
            .attributes
            .map(|data| data.into_inputs())
            .unwrap_or_default(),
    )?;

    let mut links = Vec::new();
    for (index, input) in request.relationships.unwrap_or_default().into_iter().enumerate() {
        links.push(plan_link(tenant_id, index, input, request.actor_id.clone())?);
    }

    let now = Utc::now();
    let row = entity::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        entity_type: Set(entity_type),
        entity_name: Set(request.entity_name.trim().to_string()),
        entity_code: Set(request.entity_code),
        entity_description: Set(request.entity_description),
        parent_entity_id: Set(parent_entity_id),
        smart_code: Set(smart_code),
        status: Set(status.as_str().to_string()),
        tags: Set(request.tags.map(|tags| serde_json::json!(tags))),
        metadata: Set(request.metadata),
        business_rules: Set(request.business_rules),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        created_by: Set(request.actor_id.clone()),
        updated_by: Set(request.actor_id),
    };

    let mut composer = TransactionComposer::new();
    composer.add(
        ENTITY_STEP,
        InsertEntity {
            tenant_id,
            parent_entity_id,
            row,
        },
    );
    for write in attributes {
        composer.add(
            format!("attribute:{}", write.field_name),
            InsertAttribute { tenant_id, write },
        );
    }
    for link in links {
        composer.add(format!("relationship:{}", link.index), link);
    }

    Ok(CreatePlan {
        tenant_id,
        composer,
    })
}

pub(super) fn plan_link(
    tenant_id: Uuid,
    index: usize,
    input: RelationshipInput,
    actor: Option<String>,
) -> Result<LinkEntity, CrudError> {
    let target = match validation::relationship_target(
        index,
        &input.relationship_type,
        input.target_entity_id.as_deref(),
        input.target_smart_code.as_deref(),
    )? {
        Some(id) => TargetRef::Id(id),
        // relationship_target guarantees the smart code is present and well formed
        None => TargetRef::SmartCode(input.target_smart_code.unwrap_or_default()),
    };

    if let Some(code) = input.smart_code.as_deref() {
        validation::smart_code(&format!("relationships[{index}].smart_code"), code)?;
    }

    let direction = input.direction.unwrap_or_else(|| "forward".to_string());
    if !DIRECTIONS.contains(&direction.as_str()) {
        return Err(CrudError::validation(
            format!("relationships[{index}].direction"),
            format!("direction '{direction}' must be forward, backward or bidirectional"),
        ));
    }

    let strength = input.strength.unwrap_or(1.0);
    if !strength.is_finite() {
        return Err(CrudError::validation(
            format!("relationships[{index}].strength"),
            "strength must be a finite number",
        ));
    }

    let effective_date = input
        .effective_date
        .as_deref()
        .map(|raw| validation::timestamp(&format!("relationships[{index}].effective_date"), raw))
        .transpose()?;
    let expiration_date = input
        .expiration_date
        .as_deref()
        .map(|raw| validation::timestamp(&format!("relationships[{index}].expiration_date"), raw))
        .transpose()?;
    if let (Some(effective), Some(expiration)) = (effective_date, expiration_date) {
        if expiration < effective {
            return Err(CrudError::validation(
                format!("relationships[{index}].expiration_date"),
                "expiration_date must not precede effective_date",
            ));
        }
    }

    Ok(LinkEntity {
        tenant_id,
        index,
        target,
        write: RelationshipWrite {
            from_entity_id: Uuid::nil(),
            to_entity_id: Uuid::nil(),
            relationship_type: input.relationship_type.trim().to_string(),
            smart_code: input.smart_code,
            direction,
            strength,
            status: "active".to_string(),
            effective_date,
            expiration_date,
            metadata: input.metadata,
            created_by: actor,
        },
    })
}

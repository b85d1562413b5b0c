//! Links an existing entity to another one after creation. Runs the same
//! resolve-then-insert step as create, behind an existence check on the
//! source, and is accounted as an update.

use std::time::Instant;

use uuid::Uuid;

use crate::composer::{StepOutput, TransactionComposer};
use crate::error::{AtStage, CrudError, ErrorEnvelope, OperationFailure, Stage};
use crate::validation;

use super::create::plan_link;
use super::steps::{ENTITY_STEP, LoadEntity, TargetRef};
use super::{CrudEngine, LinkEntityRequest, LinkEntityResponse, OperationKind, tenant_hint};

const LINK_STEP: &str = "relationship:0";

struct LinkPlan {
    tenant_id: Uuid,
    entity_id: Uuid,
    composer: TransactionComposer,
}

impl CrudEngine {
    /// Adds one relationship from an existing entity.
    pub async fn link_entity(
        &self,
        request: LinkEntityRequest,
    ) -> Result<LinkEntityResponse, ErrorEnvelope> {
        let started = Instant::now();
        let tenant = tenant_hint(&request.tenant_id);

        match self.run_link(request, started).await {
            Ok(response) => Ok(response),
            Err(failure) => Err(self
                .reject(OperationKind::Update, tenant, started, failure)
                .await),
        }
    }

    async fn run_link(
        &self,
        request: LinkEntityRequest,
        started: Instant,
    ) -> Result<LinkEntityResponse, OperationFailure> {
        let LinkPlan {
            tenant_id,
            entity_id,
            composer,
        } = plan_link_entity(request).at_stage(Stage::Validation)?;

        let store_calls = composer.len() as u32 + 3;
        let results = composer
            .execute(&self.db)
            .await
            .at_stage(Stage::AtomicTransaction)?;

        let relationship = match results.get(LINK_STEP) {
            Some(StepOutput::Relationship(model)) => model.clone(),
            _ => {
                return Err(CrudError::transaction("link step produced no relationship"))
                    .at_stage(Stage::ResponseMapping);
            }
        };

        self.monitor.invalidate_tenant(tenant_id).await;
        let (performance, warnings) = self
            .succeed(OperationKind::Update, tenant_id, started, store_calls, false)
            .await;

        Ok(LinkEntityResponse {
            success: true,
            entity_id,
            relationship,
            performance,
            warnings,
        })
    }
}

fn plan_link_entity(request: LinkEntityRequest) -> Result<LinkPlan, CrudError> {
    let tenant_id = validation::tenant_id(&request.tenant_id)?;
    let entity_id = validation::entity_id("entity_id", &request.entity_id)?;

    let link = plan_link(tenant_id, 0, request.relationship, request.actor_id)?;
    if link.target == TargetRef::Id(entity_id) {
        return Err(CrudError::relationship(
            "relationship.target_entity_id",
            "an entity cannot be linked to itself",
        ));
    }

    let mut composer = TransactionComposer::new();
    composer.add(
        ENTITY_STEP,
        LoadEntity {
            tenant_id,
            entity_id,
        },
    );
    composer.add(LINK_STEP, link);

    Ok(LinkPlan {
        tenant_id,
        entity_id,
        composer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::RelationshipInput;

    #[test]
    fn self_link_is_rejected() {
        let entity = Uuid::new_v4();
        let err = plan_link_entity(LinkEntityRequest {
            tenant_id: Uuid::new_v4().to_string(),
            entity_id: entity.to_string(),
            relationship: RelationshipInput::to_id("related_to", entity),
            actor_id: None,
        })
        .err()
        .unwrap();
        assert_eq!(err.code(), "RELATIONSHIP_ERROR");
    }

    #[test]
    fn plan_checks_source_before_linking() {
        let plan = plan_link_entity(LinkEntityRequest {
            tenant_id: Uuid::new_v4().to_string(),
            entity_id: Uuid::new_v4().to_string(),
            relationship: RelationshipInput::to_id("customer_of", Uuid::new_v4()),
            actor_id: None,
        })
        .unwrap();
        assert_eq!(plan.composer.len(), 2);
    }
}

//! Delete-Entity-Complete: optional cascades followed by hard removal, soft
//! deletion or archival of the entity row.

use std::time::Instant;

use uuid::Uuid;

use crate::composer::{StepOutput, StepResults, TransactionComposer};
use crate::error::{AtStage, CrudError, ErrorEnvelope, OperationFailure, Stage};
use crate::validation;

use super::steps::{DeleteAllAttributes, DeleteRelationships, ENTITY_STEP, LoadEntity, RetireEntity};
use super::{
    CrudEngine, DeleteEntityRequest, DeleteEntityResponse, DeleteMode, DeletedSummary,
    OperationKind, tenant_hint,
};

const RELATIONSHIPS_STEP: &str = "delete_relationships";
const ATTRIBUTES_STEP: &str = "delete_attributes";
const RETIRE_STEP: &str = "retire_entity";

struct DeletePlan {
    tenant_id: Uuid,
    entity_id: Uuid,
    mode: DeleteMode,
    composer: TransactionComposer,
}

impl CrudEngine {
    /// Deletes, soft-deletes or archives an entity atomically.
    pub async fn delete_entity(
        &self,
        request: DeleteEntityRequest,
    ) -> Result<DeleteEntityResponse, ErrorEnvelope> {
        let started = Instant::now();
        let tenant = tenant_hint(&request.tenant_id);

        match self.run_delete(request, started).await {
            Ok(response) => Ok(response),
            Err(failure) => Err(self
                .reject(OperationKind::Delete, tenant, started, failure)
                .await),
        }
    }

    async fn run_delete(
        &self,
        request: DeleteEntityRequest,
        started: Instant,
    ) -> Result<DeleteEntityResponse, OperationFailure> {
        let DeletePlan {
            tenant_id,
            entity_id,
            mode,
            composer,
        } = plan_delete(&request).at_stage(Stage::Validation)?;

        let store_calls = composer.len() as u32 + 2;
        let results = composer
            .execute(&self.db)
            .await
            .at_stage(Stage::AtomicTransaction)?;

        let deleted = DeletedSummary {
            entity: affected(&results, RETIRE_STEP) > 0,
            mode,
            relationships: affected(&results, RELATIONSHIPS_STEP),
            attributes: affected(&results, ATTRIBUTES_STEP),
        };

        self.monitor.invalidate_tenant(tenant_id).await;
        let (performance, warnings) = self
            .succeed(OperationKind::Delete, tenant_id, started, store_calls, false)
            .await;

        Ok(DeleteEntityResponse {
            success: true,
            entity_id,
            deleted,
            performance,
            warnings,
        })
    }
}

fn affected(results: &StepResults, step: &str) -> u64 {
    match results.get(step) {
        Some(StepOutput::Affected { count, .. }) => *count,
        _ => 0,
    }
}

fn plan_delete(request: &DeleteEntityRequest) -> Result<DeletePlan, CrudError> {
    let tenant_id = validation::tenant_id(&request.tenant_id)?;
    let entity_id = validation::entity_id("entity_id", &request.entity_id)?;

    let mut composer = TransactionComposer::new();
    composer.add(
        ENTITY_STEP,
        LoadEntity {
            tenant_id,
            entity_id,
        },
    );
    if request.cascade_relationships {
        composer.add(
            RELATIONSHIPS_STEP,
            DeleteRelationships {
                tenant_id,
                entity_id,
            },
        );
    }
    if request.cascade_attributes {
        composer.add(
            ATTRIBUTES_STEP,
            DeleteAllAttributes {
                tenant_id,
                entity_id,
            },
        );
    }
    composer.add(
        RETIRE_STEP,
        RetireEntity {
            tenant_id,
            entity_id,
            mode: request.mode,
        },
    );

    Ok(DeletePlan {
        tenant_id,
        entity_id,
        mode: request.mode,
        composer,
    })
}

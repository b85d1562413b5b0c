//! Query-Entity-Complete: filtered, ordered, paginated read with optional
//! attribute and relationship expansion, served from the result cache when a
//! fresh entry exists.

use std::time::Instant;

use tracing::debug;

use crate::error::{AtStage, CrudError, ErrorEnvelope, OperationFailure, Stage};
use crate::models::entity::EntityStatus;
use crate::repositories::{
    AttributeRepository, EntityFilter, EntityRepository, OrderField, RelationshipRepository, Side,
};
use crate::validation;

use super::{
    AttributeExpansion, AttributeView, CrudEngine, EntityResult, OneOrMany, OperationKind,
    Pagination, QueryEntityRequest, QueryEntityResponse, RelationshipExpansion, RelationshipSides,
    tenant_hint,
};

const DEFAULT_LIMIT: u64 = 100;

/// Which relationship sides to load, and of which types.
#[derive(Debug, Clone, PartialEq)]
struct RelationshipPlan {
    incoming: bool,
    outgoing: bool,
    types: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
struct QueryPlan {
    filter: EntityFilter,
    /// `Some(None)` loads every field, `Some(Some(names))` only the named ones
    attributes: Option<Option<Vec<String>>>,
    relationships: Option<RelationshipPlan>,
}

impl CrudEngine {
    /// Reads entities for one tenant with optional expansion.
    pub async fn query_entities(
        &self,
        request: QueryEntityRequest,
    ) -> Result<QueryEntityResponse, ErrorEnvelope> {
        let started = Instant::now();
        let tenant = tenant_hint(&request.tenant_id);

        match self.run_query(request, started).await {
            Ok(response) => Ok(response),
            Err(failure) => Err(self
                .reject(OperationKind::Query, tenant, started, failure)
                .await),
        }
    }

    async fn run_query(
        &self,
        request: QueryEntityRequest,
        started: Instant,
    ) -> Result<QueryEntityResponse, OperationFailure> {
        let plan = plan_query(&request).at_stage(Stage::Validation)?;
        let tenant_id = plan.filter.tenant_id;

        let cache_key = if self.monitor.cache_enabled() {
            let fingerprint = serde_json::to_string(&request)
                .map_err(|err| CrudError::Unknown {
                    message: format!("failed to fingerprint query: {err}"),
                })
                .at_stage(Stage::CacheLookup)?;
            Some(
                self.monitor
                    .cache_key(OperationKind::Query, tenant_id, fingerprint),
            )
        } else {
            None
        };

        if let Some(key) = &cache_key {
            if let Some(cached) = self.monitor.cached(key).await {
                match serde_json::from_value::<QueryEntityResponse>(cached) {
                    Ok(mut response) => {
                        let (performance, warnings) = self
                            .succeed(OperationKind::Query, tenant_id, started, 0, true)
                            .await;
                        response.performance = performance;
                        response.warnings = warnings;
                        return Ok(response);
                    }
                    Err(err) => debug!(error = %err, "Discarding unreadable cache entry"),
                }
            }
        }

        let (results, store_calls) = self
            .load(&plan)
            .await
            .at_stage(Stage::QueryExecution)?;

        let pagination = Pagination {
            limit: plan.filter.limit,
            offset: plan.filter.offset,
            returned: results.len(),
            has_more: results.len() as u64 == plan.filter.limit,
        };

        let (performance, warnings) = self
            .succeed(OperationKind::Query, tenant_id, started, store_calls, false)
            .await;
        let response = QueryEntityResponse {
            success: true,
            results,
            pagination,
            performance,
            warnings,
        };

        if let Some(key) = cache_key {
            let value = serde_json::to_value(&response)
                .map_err(|err| CrudError::Unknown {
                    message: format!("failed to cache query result: {err}"),
                })
                .at_stage(Stage::ResponseMapping)?;
            self.monitor.store(key, value).await;
        }

        Ok(response)
    }

    /// Runs the entity read and the per-entity expansions; returns the results
    /// and the number of store round trips.
    async fn load(&self, plan: &QueryPlan) -> Result<(Vec<EntityResult>, u32), CrudError> {
        let tenant_id = plan.filter.tenant_id;
        let entities = EntityRepository::new(&self.db).search(&plan.filter).await?;
        let mut store_calls = 1u32;

        let attributes = AttributeRepository::new(&self.db);
        let relationships = RelationshipRepository::new(&self.db);
        let mut results = Vec::with_capacity(entities.len());

        for entity in entities {
            let attribute_views = match &plan.attributes {
                Some(fields) => {
                    store_calls += 1;
                    let rows = attributes
                        .list_for_entity(tenant_id, entity.id, fields.as_deref())
                        .await?;
                    Some(rows.into_iter().map(AttributeView::from).collect())
                }
                None => None,
            };

            let sides = match &plan.relationships {
                Some(selection) => {
                    let mut sides = RelationshipSides::default();
                    if selection.incoming {
                        store_calls += 1;
                        sides.incoming = Some(
                            relationships
                                .list_for_entity(
                                    tenant_id,
                                    entity.id,
                                    Side::Incoming,
                                    selection.types.as_deref(),
                                )
                                .await?,
                        );
                    }
                    if selection.outgoing {
                        store_calls += 1;
                        sides.outgoing = Some(
                            relationships
                                .list_for_entity(
                                    tenant_id,
                                    entity.id,
                                    Side::Outgoing,
                                    selection.types.as_deref(),
                                )
                                .await?,
                        );
                    }
                    Some(sides)
                }
                None => None,
            };

            results.push(EntityResult {
                entity,
                attributes: attribute_views,
                relationships: sides,
            });
        }

        Ok((results, store_calls))
    }
}

fn plan_query(request: &QueryEntityRequest) -> Result<QueryPlan, CrudError> {
    let tenant_id = validation::tenant_id(&request.tenant_id)?;
    let mut filter = EntityFilter::for_tenant(tenant_id);

    if request.entity_id.is_some() || request.entity_ids.is_some() {
        let mut ids = Vec::new();
        if let Some(raw) = request.entity_id.as_deref() {
            ids.push(validation::entity_id("entity_id", raw)?);
        }
        for (index, raw) in request.entity_ids.iter().flatten().enumerate() {
            ids.push(validation::entity_id(&format!("entity_ids[{index}]"), raw)?);
        }
        filter.ids = Some(ids);
    }

    for entity_type in many(&request.entity_type) {
        validation::entity_type(&entity_type)?;
        filter.entity_types.push(entity_type.trim().to_string());
    }

    for smart_code in many(&request.smart_code) {
        validation::smart_code("smart_code", &smart_code)?;
        filter.smart_codes.push(smart_code);
    }

    for status in many(&request.status) {
        let parsed = EntityStatus::parse(&status).ok_or_else(|| {
            CrudError::validation(
                "status",
                format!("status '{status}' must be active, archived or deleted"),
            )
        })?;
        filter.statuses.push(parsed);
    }

    if let Some(order_by) = request.order_by.as_deref() {
        filter.order_by = OrderField::parse(order_by).ok_or_else(|| {
            CrudError::validation("order_by", format!("cannot order by '{order_by}'"))
        })?;
    }
    filter.descending = match request.order_direction.as_deref() {
        None => true,
        Some(direction) if direction.eq_ignore_ascii_case("desc") => true,
        Some(direction) if direction.eq_ignore_ascii_case("asc") => false,
        Some(direction) => {
            return Err(CrudError::validation(
                "order_direction",
                format!("order_direction '{direction}' must be asc or desc"),
            ));
        }
    };

    filter.limit = request.limit.unwrap_or(DEFAULT_LIMIT);
    validation::limit(filter.limit)?;
    filter.offset = request.offset.unwrap_or(0);

    let attributes = match &request.include_attributes {
        None | Some(AttributeExpansion::All(false)) => None,
        Some(AttributeExpansion::All(true)) => Some(None),
        Some(AttributeExpansion::Fields(fields)) => {
            for field in fields {
                validation::field_name(field)?;
            }
            Some(Some(fields.clone()))
        }
    };

    let relationships = match &request.include_relationships {
        None | Some(RelationshipExpansion::All(false)) => None,
        Some(RelationshipExpansion::All(true)) => Some(RelationshipPlan {
            incoming: true,
            outgoing: true,
            types: None,
        }),
        Some(RelationshipExpansion::Detailed {
            incoming,
            outgoing,
            types,
        }) => (*incoming || *outgoing).then(|| RelationshipPlan {
            incoming: *incoming,
            outgoing: *outgoing,
            types: types.clone(),
        }),
    };

    Ok(QueryPlan {
        filter,
        attributes,
        relationships,
    })
}

fn many(value: &Option<OneOrMany<String>>) -> Vec<String> {
    value.clone().map(OneOrMany::into_vec).unwrap_or_default()
}

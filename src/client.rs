//! # Client Facade
//!
//! Per-domain helpers over the entity operations, bound to one tenant.
//! Nothing here validates or touches the store directly; every call shapes a
//! request and hands it to the [`CrudEngine`].

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ErrorEnvelope;
use crate::operations::{
    AttributeChanges, AttributeData, AttributeExpansion, CreateEntityRequest,
    CreateEntityResponse, CrudEngine, DeleteEntityRequest, DeleteEntityResponse, DeleteMode,
    EntityResult, LinkEntityRequest, LinkEntityResponse, OneOrMany, QueryEntityRequest,
    QueryEntityResponse, RelationshipExpansion, RelationshipInput, UpdateEntityRequest,
    UpdateEntityResponse,
};

/// Relationship type linking an appointment to its customer.
pub const APPOINTMENT_CUSTOMER_LINK: &str = "appointment_for";

/// Tenant-bound convenience client.
#[derive(Clone)]
pub struct CrudClient {
    engine: CrudEngine,
    tenant_id: Uuid,
    actor_id: Option<String>,
}

impl CrudClient {
    pub fn new(engine: CrudEngine, tenant_id: Uuid) -> Self {
        Self {
            engine,
            tenant_id,
            actor_id: None,
        }
    }

    /// Records `actor_id` as creator/updater on every write.
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub async fn create_customer(
        &self,
        name: &str,
        attributes: Map<String, Value>,
    ) -> Result<CreateEntityResponse, ErrorEnvelope> {
        self.create("customer", name, attributes, Vec::new()).await
    }

    pub async fn create_product(
        &self,
        name: &str,
        attributes: Map<String, Value>,
    ) -> Result<CreateEntityResponse, ErrorEnvelope> {
        self.create("product", name, attributes, Vec::new()).await
    }

    /// Creates an appointment already linked to `customer_id`.
    pub async fn create_appointment(
        &self,
        name: &str,
        customer_id: Uuid,
        attributes: Map<String, Value>,
    ) -> Result<CreateEntityResponse, ErrorEnvelope> {
        self.create(
            "appointment",
            name,
            attributes,
            vec![RelationshipInput::to_id(APPOINTMENT_CUSTOMER_LINK, customer_id)],
        )
        .await
    }

    /// Creates an entity of any type.
    pub async fn create(
        &self,
        entity_type: &str,
        name: &str,
        attributes: Map<String, Value>,
        relationships: Vec<RelationshipInput>,
    ) -> Result<CreateEntityResponse, ErrorEnvelope> {
        self.engine
            .create_entity(CreateEntityRequest {
                tenant_id: self.tenant_id.to_string(),
                entity_type: entity_type.to_string(),
                entity_name: name.to_string(),
                attributes: (!attributes.is_empty()).then_some(AttributeData::Map(attributes)),
                relationships: (!relationships.is_empty()).then_some(relationships),
                actor_id: self.actor_id.clone(),
                ..Default::default()
            })
            .await
    }

    /// One entity with all attributes and both relationship sides, or `None`
    /// when it does not exist for this tenant.
    pub async fn get_entity(&self, entity_id: Uuid) -> Result<Option<EntityResult>, ErrorEnvelope> {
        let request = QueryEntityRequest {
            entity_id: Some(entity_id.to_string()),
            // archived and deleted rows are still addressable by id
            status: Some(OneOrMany::Many(vec![
                "active".to_string(),
                "archived".to_string(),
                "deleted".to_string(),
            ])),
            limit: Some(1),
            include_attributes: Some(AttributeExpansion::All(true)),
            include_relationships: Some(RelationshipExpansion::All(true)),
            ..QueryEntityRequest::for_tenant(self.tenant_id.to_string())
        };
        let response = self.engine.query_entities(request).await?;
        Ok(response.results.into_iter().next())
    }

    /// Active and archived entities of one type, newest first.
    pub async fn list_entities(
        &self,
        entity_type: &str,
        limit: u64,
        offset: u64,
    ) -> Result<QueryEntityResponse, ErrorEnvelope> {
        self.engine
            .query_entities(QueryEntityRequest {
                entity_type: Some(OneOrMany::One(entity_type.to_string())),
                limit: Some(limit),
                offset: Some(offset),
                ..QueryEntityRequest::for_tenant(self.tenant_id.to_string())
            })
            .await
    }

    /// Inserts or overwrites the given fields.
    pub async fn set_attributes(
        &self,
        entity_id: Uuid,
        attributes: Map<String, Value>,
    ) -> Result<UpdateEntityResponse, ErrorEnvelope> {
        self.update_attributes(
            entity_id,
            AttributeChanges {
                upsert: Some(AttributeData::Map(attributes)),
                delete: None,
            },
        )
        .await
    }

    pub async fn remove_attributes(
        &self,
        entity_id: Uuid,
        field_names: Vec<String>,
    ) -> Result<UpdateEntityResponse, ErrorEnvelope> {
        self.update_attributes(
            entity_id,
            AttributeChanges {
                upsert: None,
                delete: Some(field_names),
            },
        )
        .await
    }

    async fn update_attributes(
        &self,
        entity_id: Uuid,
        changes: AttributeChanges,
    ) -> Result<UpdateEntityResponse, ErrorEnvelope> {
        self.engine
            .update_entity(UpdateEntityRequest {
                tenant_id: self.tenant_id.to_string(),
                entity_id: entity_id.to_string(),
                attributes: Some(changes),
                actor_id: self.actor_id.clone(),
                ..Default::default()
            })
            .await
    }

    /// Adds a forward relationship `from -> to`.
    pub async fn link(
        &self,
        from: Uuid,
        relationship_type: &str,
        to: Uuid,
    ) -> Result<LinkEntityResponse, ErrorEnvelope> {
        self.engine
            .link_entity(LinkEntityRequest {
                tenant_id: self.tenant_id.to_string(),
                entity_id: from.to_string(),
                relationship: RelationshipInput::to_id(relationship_type, to),
                actor_id: self.actor_id.clone(),
            })
            .await
    }

    /// Archives the entity and leaves its attributes and links in place.
    pub async fn archive(&self, entity_id: Uuid) -> Result<DeleteEntityResponse, ErrorEnvelope> {
        self.engine
            .delete_entity(DeleteEntityRequest {
                cascade_relationships: false,
                cascade_attributes: false,
                ..DeleteEntityRequest::new(
                    self.tenant_id.to_string(),
                    entity_id.to_string(),
                    DeleteMode::Archive,
                )
            })
            .await
    }

    /// Removes the entity with full cascade.
    pub async fn delete(
        &self,
        entity_id: Uuid,
        mode: DeleteMode,
    ) -> Result<DeleteEntityResponse, ErrorEnvelope> {
        self.engine
            .delete_entity(DeleteEntityRequest::new(
                self.tenant_id.to_string(),
                entity_id.to_string(),
                mode,
            ))
            .await
    }
}

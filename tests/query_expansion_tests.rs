//! Attribute and relationship expansion on query results.

mod test_utils;

use master_crud::operations::{
    AttributeExpansion, CrudEngine, QueryEntityRequest, RelationshipExpansion, RelationshipInput,
};
use serde_json::json;
use test_utils::{create_request, new_tenant, test_engine};
use uuid::Uuid;

/// Store <-shops_at- customer -referred_by-> friend. Returns (store, customer, friend).
async fn graph(engine: &CrudEngine, tenant: Uuid) -> (Uuid, Uuid, Uuid) {
    let store = engine
        .create_entity(create_request(tenant, "store", "Main Street", json!({})))
        .await
        .unwrap()
        .entity_id;
    let friend = engine
        .create_entity(create_request(tenant, "customer", "Friend", json!({})))
        .await
        .unwrap()
        .entity_id;

    let mut request = create_request(
        tenant,
        "customer",
        "Hub",
        json!({"email": "hub@example.test", "tier": "gold", "points": 300}),
    );
    request.relationships = Some(vec![
        RelationshipInput::to_id("shops_at", store),
        RelationshipInput::to_id("referred_by", friend),
    ]);
    let customer = engine.create_entity(request).await.unwrap().entity_id;
    (store, customer, friend)
}

fn by_id(tenant: Uuid, id: Uuid) -> QueryEntityRequest {
    QueryEntityRequest {
        entity_id: Some(id.to_string()),
        ..QueryEntityRequest::for_tenant(tenant.to_string())
    }
}

#[tokio::test]
async fn no_expansion_by_default() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let (_, customer, _) = graph(&engine, tenant).await;

    let response = engine.query_entities(by_id(tenant, customer)).await.unwrap();

    assert_eq!(response.results.len(), 1);
    assert!(response.results[0].attributes.is_none());
    assert!(response.results[0].relationships.is_none());
    assert_eq!(response.performance.store_calls, 1);
}

#[tokio::test]
async fn attribute_subset_is_honoured() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let (_, customer, _) = graph(&engine, tenant).await;

    let response = engine
        .query_entities(QueryEntityRequest {
            include_attributes: Some(AttributeExpansion::Fields(vec![
                "tier".to_string(),
                "points".to_string(),
            ])),
            ..by_id(tenant, customer)
        })
        .await
        .unwrap();

    let attributes = response.results[0].attributes.as_ref().unwrap();
    assert_eq!(attributes.len(), 2);
    let points = attributes
        .iter()
        .find(|attribute| attribute.field_name == "points")
        .unwrap();
    assert_eq!(points.field_type, "number");
    assert_eq!(points.value, json!(300.0));
}

#[tokio::test]
async fn both_relationship_sides_are_loaded() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let (store, customer, _) = graph(&engine, tenant).await;

    let hub = engine
        .query_entities(QueryEntityRequest {
            include_relationships: Some(RelationshipExpansion::All(true)),
            ..by_id(tenant, customer)
        })
        .await
        .unwrap();
    let sides = hub.results[0].relationships.as_ref().unwrap();
    assert_eq!(sides.outgoing.as_ref().unwrap().len(), 2);
    assert!(sides.incoming.as_ref().unwrap().is_empty());

    let target = engine
        .query_entities(QueryEntityRequest {
            include_relationships: Some(RelationshipExpansion::All(true)),
            ..by_id(tenant, store)
        })
        .await
        .unwrap();
    let sides = target.results[0].relationships.as_ref().unwrap();
    let incoming = sides.incoming.as_ref().unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].from_entity_id, customer);
}

#[tokio::test]
async fn relationship_types_and_sides_filter() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let (_, customer, friend) = graph(&engine, tenant).await;

    let response = engine
        .query_entities(QueryEntityRequest {
            include_relationships: Some(RelationshipExpansion::Detailed {
                incoming: false,
                outgoing: true,
                types: Some(vec!["referred_by".to_string()]),
            }),
            ..by_id(tenant, customer)
        })
        .await
        .unwrap();

    let sides = response.results[0].relationships.as_ref().unwrap();
    assert!(sides.incoming.is_none());
    let outgoing = sides.outgoing.as_ref().unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].to_entity_id, friend);
    assert_eq!(response.performance.store_calls, 2);
}

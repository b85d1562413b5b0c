//! Limit/offset windows and the `has_more` hint.

mod test_utils;

use master_crud::operations::{CrudEngine, OneOrMany, QueryEntityRequest};
use serde_json::json;
use test_utils::{create_request, new_tenant, test_engine};
use uuid::Uuid;

async fn seed(engine: &CrudEngine, tenant: Uuid, count: usize) {
    for index in 0..count {
        engine
            .create_entity(create_request(
                tenant,
                "product",
                &format!("Product {index:02}"),
                json!({}),
            ))
            .await
            .unwrap();
    }
}

fn page(tenant: Uuid, limit: u64, offset: u64) -> QueryEntityRequest {
    QueryEntityRequest {
        entity_type: Some(OneOrMany::One("product".to_string())),
        order_by: Some("entity_name".to_string()),
        order_direction: Some("asc".to_string()),
        limit: Some(limit),
        offset: Some(offset),
        ..QueryEntityRequest::for_tenant(tenant.to_string())
    }
}

#[tokio::test]
async fn full_page_reports_more() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    seed(&engine, tenant, 25).await;

    let response = engine.query_entities(page(tenant, 10, 0)).await.unwrap();

    assert_eq!(response.results.len(), 10);
    assert_eq!(response.pagination.returned, 10);
    assert!(response.pagination.has_more);
    assert_eq!(response.results[0].entity.entity_name, "Product 00");
}

#[tokio::test]
async fn last_partial_page_reports_no_more() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    seed(&engine, tenant, 25).await;

    let response = engine.query_entities(page(tenant, 10, 20)).await.unwrap();

    assert_eq!(response.results.len(), 5);
    assert!(!response.pagination.has_more);
    assert_eq!(response.pagination.offset, 20);
    assert_eq!(response.results[0].entity.entity_name, "Product 20");
}

#[tokio::test]
async fn small_result_set_is_not_paginated() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    seed(&engine, tenant, 5).await;

    let response = engine.query_entities(page(tenant, 10, 0)).await.unwrap();

    assert_eq!(response.results.len(), 5);
    assert!(!response.pagination.has_more);
}

#[tokio::test]
async fn descending_order_reverses_names() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    seed(&engine, tenant, 3).await;

    let mut request = page(tenant, 10, 0);
    request.order_direction = Some("desc".to_string());
    let response = engine.query_entities(request).await.unwrap();

    let names: Vec<&str> = response
        .results
        .iter()
        .map(|result| result.entity.entity_name.as_str())
        .collect();
    assert_eq!(names, vec!["Product 02", "Product 01", "Product 00"]);
}

#[tokio::test]
async fn out_of_range_limit_is_rejected() {
    let engine = test_engine().await.unwrap();
    let envelope = engine
        .query_entities(page(new_tenant(), 1001, 0))
        .await
        .unwrap_err();

    assert_eq!(envelope.error_code, "VALIDATION_ERROR");
    assert_eq!(envelope.first().unwrap().field.as_deref(), Some("limit"));
}

#[tokio::test]
async fn empty_id_list_matches_nothing() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    seed(&engine, tenant, 3).await;

    let response = engine
        .query_entities(QueryEntityRequest {
            entity_ids: Some(Vec::new()),
            ..QueryEntityRequest::for_tenant(tenant.to_string())
        })
        .await
        .unwrap();
    assert!(response.results.is_empty());
    assert!(!response.pagination.has_more);

    let unfiltered = engine
        .query_entities(QueryEntityRequest::for_tenant(tenant.to_string()))
        .await
        .unwrap();
    assert_eq!(unfiltered.results.len(), 3);
}

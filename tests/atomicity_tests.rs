//! All-or-nothing behaviour of the composite mutations.

mod test_utils;

use master_crud::operations::{
    AttributeChanges, AttributeData, AttributeInput, RelationshipInput, UpdateEntityRequest,
};
use serde_json::json;
use uuid::Uuid;
use test_utils::{create_request, new_tenant, row_counts, test_engine};

#[tokio::test]
async fn unresolved_relationship_rolls_back_entity_and_attributes() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();

    let mut request = create_request(
        tenant,
        "customer",
        "Orphan Customer",
        json!({"email": "orphan@example.test", "vip": true}),
    );
    request.relationships = Some(vec![RelationshipInput::to_smart_code(
        "member_of",
        "HERA.CRM.GROUP.ENTITY.MISSING.V1",
    )]);

    let envelope = engine.create_entity(request).await.unwrap_err();

    assert_eq!(envelope.error_code, "RELATIONSHIP_ERROR");
    assert_eq!(envelope.performance.stage.as_str(), "atomic_transaction");
    assert_eq!(
        envelope.first().unwrap().field.as_deref(),
        Some("relationships[0].target_smart_code")
    );
    assert_eq!(row_counts(engine.db(), tenant).await.unwrap(), (0, 0, 0));
}

#[tokio::test]
async fn validation_failure_writes_nothing() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();

    let mut request = create_request(tenant, "customer", "Typed Badly", json!({}));
    request.attributes = Some(AttributeData::List(vec![
        AttributeInput::new("email", json!("ok@example.test")),
        AttributeInput::typed("credit_limit", "number", json!("lots")),
    ]));

    let envelope = engine.create_entity(request).await.unwrap_err();

    assert_eq!(envelope.error_code, "ATTRIBUTE_TYPE_ERROR");
    assert_eq!(envelope.performance.stage.as_str(), "validation");
    assert_eq!(row_counts(engine.db(), tenant).await.unwrap(), (0, 0, 0));
}

#[tokio::test]
async fn update_of_missing_entity_changes_nothing() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let created = engine
        .create_entity(create_request(
            tenant,
            "customer",
            "Existing",
            json!({"email": "a@example.test"}),
        ))
        .await
        .unwrap();

    let envelope = engine
        .update_entity(UpdateEntityRequest {
            tenant_id: tenant.to_string(),
            entity_id: Uuid::new_v4().to_string(),
            entity_name: Some("Nobody".to_string()),
            attributes: Some(AttributeChanges {
                upsert: Some(AttributeData::Map(
                    json!({"email": "b@example.test"}).as_object().cloned().unwrap(),
                )),
                delete: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert_eq!(envelope.error_code, "ENTITY_NOT_FOUND");
    assert_eq!(row_counts(engine.db(), tenant).await.unwrap(), (1, 1, 0));
    assert_eq!(created.entity.entity_name, "Existing");
}

#[tokio::test]
async fn successful_create_commits_every_row() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();

    let group = engine
        .create_entity(create_request(tenant, "group", "Loyalty Club", json!({})))
        .await
        .unwrap();

    let mut request = create_request(
        tenant,
        "customer",
        "Member",
        json!({"email": "member@example.test", "points": 120}),
    );
    request.relationships = Some(vec![RelationshipInput::to_smart_code(
        "member_of",
        group.entity.smart_code.clone(),
    )]);
    let created = engine.create_entity(request).await.unwrap();

    assert_eq!(created.created_attribute_ids.len(), 2);
    assert_eq!(created.created_relationship_ids.len(), 1);
    assert_eq!(row_counts(engine.db(), tenant).await.unwrap(), (2, 2, 1));
}

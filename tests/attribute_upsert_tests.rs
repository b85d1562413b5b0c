//! Re-setting a field updates the existing attribute row instead of adding one.

mod test_utils;

use master_crud::error::is_unique_violation;
use master_crud::models::attribute::FieldValue;
use master_crud::operations::{
    AttributeChanges, AttributeData, AttributeExpansion, QueryEntityRequest,
    UpdateEntityRequest,
};
use master_crud::repositories::{AttributeRepository, AttributeWrite};
use serde_json::{Value, json};
use test_utils::{create_request, new_tenant, test_engine};
use uuid::Uuid;

fn upsert(tenant: Uuid, entity: Uuid, values: Value) -> UpdateEntityRequest {
    UpdateEntityRequest {
        tenant_id: tenant.to_string(),
        entity_id: entity.to_string(),
        attributes: Some(AttributeChanges {
            upsert: Some(AttributeData::Map(values.as_object().cloned().unwrap())),
            delete: None,
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn repeated_upsert_keeps_one_row_with_latest_value() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let created = engine
        .create_entity(create_request(
            tenant,
            "customer",
            "Repeat Buyer",
            json!({"email": "first@example.test"}),
        ))
        .await
        .unwrap();
    let original_id = created.created_attribute_ids[0];

    let first = engine
        .update_entity(upsert(tenant, created.entity_id, json!({"email": "second@example.test"})))
        .await
        .unwrap();
    let second = engine
        .update_entity(upsert(tenant, created.entity_id, json!({"email": "third@example.test"})))
        .await
        .unwrap();

    assert_eq!(first.changes.upserted, vec![original_id]);
    assert_eq!(second.changes.upserted, vec![original_id]);

    let rows = AttributeRepository::new(engine.db())
        .list_for_entity(tenant, created.entity_id, None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value(), json!("third@example.test"));
}

#[tokio::test]
async fn upsert_can_change_field_type() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let created = engine
        .create_entity(create_request(tenant, "product", "Gadget", json!({"stock": 12})))
        .await
        .unwrap();

    engine
        .update_entity(upsert(tenant, created.entity_id, json!({"stock": "backordered"})))
        .await
        .unwrap();

    let row = AttributeRepository::new(engine.db())
        .find_field(tenant, created.entity_id, "stock")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.field_type, "text");
    assert_eq!(row.field_value_text.as_deref(), Some("backordered"));
    assert!(row.field_value_number.is_none());
}

#[tokio::test]
async fn upsert_and_delete_in_one_update() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let created = engine
        .create_entity(create_request(
            tenant,
            "customer",
            "Mixed Changes",
            json!({"email": "a@example.test", "fax": "555-0199"}),
        ))
        .await
        .unwrap();

    let mut request = upsert(tenant, created.entity_id, json!({"phone": "555-0100"}));
    if let Some(changes) = request.attributes.as_mut() {
        changes.delete = Some(vec!["fax".to_string(), "never_set".to_string()]);
    }
    let response = engine.update_entity(request).await.unwrap();

    assert_eq!(response.changes.upserted.len(), 1);
    assert_eq!(response.changes.deleted.len(), 1);

    let query = engine
        .query_entities(QueryEntityRequest {
            entity_id: Some(created.entity_id.to_string()),
            include_attributes: Some(AttributeExpansion::All(true)),
            ..QueryEntityRequest::for_tenant(tenant.to_string())
        })
        .await
        .unwrap();
    let mut names: Vec<String> = query.results[0]
        .attributes
        .as_ref()
        .unwrap()
        .iter()
        .map(|attribute| attribute.field_name.clone())
        .collect();
    names.sort();
    assert_eq!(names, vec!["email".to_string(), "phone".to_string()]);
}

#[tokio::test]
async fn unique_index_rejects_raw_duplicate_insert() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let created = engine
        .create_entity(create_request(tenant, "customer", "Indexed", json!({"email": "x@example.test"})))
        .await
        .unwrap();

    let err = AttributeRepository::new(engine.db())
        .insert(
            tenant,
            created.entity_id,
            AttributeWrite::new("email", FieldValue::Text("dup@example.test".to_string())),
        )
        .await
        .unwrap_err();

    assert!(is_unique_violation(&err));
}

//! Relationship targets resolved by id or by smart code, always within the tenant.

mod test_utils;

use master_crud::operations::{
    CreateEntityRequest, DeleteEntityRequest, DeleteMode, LinkEntityRequest, RelationshipInput,
};
use master_crud::repositories::{EntityRepository, RelationshipRepository, Side};
use serde_json::json;
use test_utils::{create_request, new_tenant, row_counts, test_engine};
use uuid::Uuid;

fn with_links(mut request: CreateEntityRequest, links: Vec<RelationshipInput>) -> CreateEntityRequest {
    request.relationships = Some(links);
    request
}

#[tokio::test]
async fn target_resolved_by_smart_code() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let mut group = create_request(tenant, "group", "VIP Club", json!({}));
    group.smart_code = Some("HERA.CRM.GROUP.ENTITY.VIP.V1".to_string());
    let group = engine.create_entity(group).await.unwrap();

    let member = engine
        .create_entity(with_links(
            create_request(tenant, "customer", "Member", json!({})),
            vec![RelationshipInput {
                strength: Some(0.5),
                direction: Some("bidirectional".to_string()),
                ..RelationshipInput::to_smart_code("member_of", "HERA.CRM.GROUP.ENTITY.VIP.V1")
            }],
        ))
        .await
        .unwrap();

    assert_eq!(member.created_relationship_ids.len(), 1);
    let outgoing = RelationshipRepository::new(engine.db())
        .list_for_entity(
            tenant,
            member.entity_id,
            Side::Outgoing,
            None,
        )
        .await
        .unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].to_entity_id, group.entity_id);
    assert_eq!(outgoing[0].relationship_direction, "bidirectional");
    assert_eq!(outgoing[0].relationship_strength, 0.5);
    assert_eq!(outgoing[0].status, "active");
}

#[tokio::test]
async fn several_smart_code_matches_link_the_oldest() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let code = "HERA.CRM.GROUP.ENTITY.SHARED.V1";

    for name in ["First", "Second"] {
        let mut request = create_request(tenant, "group", name, json!({}));
        request.smart_code = Some(code.to_string());
        engine.create_entity(request).await.unwrap();
    }

    let candidates = EntityRepository::new(engine.db())
        .find_by_smart_code(tenant, code)
        .await
        .unwrap();
    assert_eq!(candidates.len(), 2);
    let expected = candidates
        .iter()
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
        .unwrap()
        .id;

    let created = engine
        .create_entity(with_links(
            create_request(tenant, "customer", "Joiner", json!({})),
            vec![RelationshipInput::to_smart_code("member_of", code)],
        ))
        .await
        .unwrap();

    let outgoing = RelationshipRepository::new(engine.db())
        .list_for_entity(
            tenant,
            created.entity_id,
            Side::Outgoing,
            None,
        )
        .await
        .unwrap();
    assert_eq!(outgoing[0].to_entity_id, expected);
}

#[tokio::test]
async fn target_in_another_tenant_is_not_found() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let other_tenant = new_tenant();

    let foreign = engine
        .create_entity(create_request(other_tenant, "store", "Elsewhere", json!({})))
        .await
        .unwrap();

    let envelope = engine
        .create_entity(with_links(
            create_request(tenant, "customer", "Crossing", json!({"email": "x@example.test"})),
            vec![RelationshipInput::to_id("shops_at", foreign.entity_id)],
        ))
        .await
        .unwrap_err();

    assert_eq!(envelope.error_code, "RELATIONSHIP_ERROR");
    assert_eq!(
        envelope.first().unwrap().field.as_deref(),
        Some("relationships[0].target_entity_id")
    );
    assert_eq!(row_counts(engine.db(), tenant).await.unwrap(), (0, 0, 0));
}

#[tokio::test]
async fn relationship_input_is_validated() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let target = Uuid::new_v4();

    let cases = vec![
        (
            RelationshipInput {
                target_entity_id: None,
                ..RelationshipInput::to_id("member_of", target)
            },
            "RELATIONSHIP_ERROR",
        ),
        (
            RelationshipInput {
                direction: Some("sideways".to_string()),
                ..RelationshipInput::to_id("member_of", target)
            },
            "VALIDATION_ERROR",
        ),
        (
            RelationshipInput {
                effective_date: Some("2025-06-01".to_string()),
                expiration_date: Some("2025-01-01".to_string()),
                ..RelationshipInput::to_id("member_of", target)
            },
            "VALIDATION_ERROR",
        ),
        (RelationshipInput::to_id("", target), "VALIDATION_ERROR"),
    ];

    for (input, expected) in cases {
        let envelope = engine
            .create_entity(with_links(
                create_request(tenant, "customer", "Invalid Link", json!({})),
                vec![input],
            ))
            .await
            .unwrap_err();
        assert_eq!(envelope.error_code, expected);
        assert_eq!(envelope.performance.stage.as_str(), "validation");
    }
}

#[tokio::test]
async fn target_named_by_both_id_and_smart_code_is_rejected() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();

    let first = engine
        .create_entity(create_request(tenant, "store", "First", json!({})))
        .await
        .unwrap();
    let mut second = create_request(tenant, "store", "Second", json!({}));
    second.smart_code = Some("HERA.RETAIL.STORE.ENTITY.SECOND.V1".to_string());
    engine.create_entity(second).await.unwrap();

    let envelope = engine
        .create_entity(with_links(
            create_request(tenant, "customer", "Ambiguous", json!({})),
            vec![RelationshipInput {
                target_smart_code: Some("HERA.RETAIL.STORE.ENTITY.SECOND.V1".to_string()),
                ..RelationshipInput::to_id("shops_at", first.entity_id)
            }],
        ))
        .await
        .unwrap_err();

    assert_eq!(envelope.error_code, "RELATIONSHIP_ERROR");
    assert_eq!(envelope.first().unwrap().field.as_deref(), Some("relationships[0]"));
    assert_eq!(envelope.performance.stage.as_str(), "validation");
    assert_eq!(row_counts(engine.db(), tenant).await.unwrap(), (2, 0, 0));
}

#[tokio::test]
async fn soft_deleted_entities_are_not_link_targets_or_parents() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let code = "HERA.RETAIL.STORE.ENTITY.CLOSED.V1";

    let mut store = create_request(tenant, "store", "Closed Store", json!({}));
    store.smart_code = Some(code.to_string());
    let store = engine.create_entity(store).await.unwrap().entity_id;
    engine
        .delete_entity(DeleteEntityRequest::new(
            tenant.to_string(),
            store.to_string(),
            DeleteMode::Soft,
        ))
        .await
        .unwrap();

    let by_id = engine
        .create_entity(with_links(
            create_request(tenant, "customer", "By Id", json!({})),
            vec![RelationshipInput::to_id("shops_at", store)],
        ))
        .await
        .unwrap_err();
    assert_eq!(by_id.error_code, "RELATIONSHIP_ERROR");
    assert_eq!(by_id.performance.stage.as_str(), "atomic_transaction");

    let by_smart_code = engine
        .create_entity(with_links(
            create_request(tenant, "customer", "By Code", json!({})),
            vec![RelationshipInput::to_smart_code("shops_at", code)],
        ))
        .await
        .unwrap_err();
    assert_eq!(by_smart_code.error_code, "RELATIONSHIP_ERROR");

    let mut child = create_request(tenant, "store", "Branch", json!({}));
    child.parent_entity_id = Some(store.to_string());
    let orphan = engine.create_entity(child).await.unwrap_err();
    assert_eq!(orphan.error_code, "VALIDATION_ERROR");
    assert_eq!(
        orphan.first().unwrap().field.as_deref(),
        Some("parent_entity_id")
    );

    // only the soft-deleted store remains
    assert_eq!(row_counts(engine.db(), tenant).await.unwrap(), (1, 0, 0));
}

#[tokio::test]
async fn link_by_smart_code_to_the_source_itself_is_rejected() {
    let engine = test_engine().await.unwrap();
    let tenant = new_tenant();
    let code = "HERA.CRM.CUSTOMER.ENTITY.SELF.V1";

    let mut request = create_request(tenant, "customer", "Narcissus", json!({}));
    request.smart_code = Some(code.to_string());
    let customer = engine.create_entity(request).await.unwrap().entity_id;

    let envelope = engine
        .link_entity(LinkEntityRequest {
            tenant_id: tenant.to_string(),
            entity_id: customer.to_string(),
            relationship: RelationshipInput::to_smart_code("related_to", code),
            actor_id: None,
        })
        .await
        .unwrap_err();

    assert_eq!(envelope.error_code, "RELATIONSHIP_ERROR");
    assert_eq!(envelope.performance.stage.as_str(), "atomic_transaction");
    assert_eq!(row_counts(engine.db(), tenant).await.unwrap(), (1, 0, 0));
}

//! Request and response shapes for the four entity lifecycle operations.
//!
//! Identifiers arrive as strings and are parsed by the validator so that a
//! malformed id becomes a classified error instead of a decoding failure.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{attribute, entity, relationship};
use crate::performance::PerformanceBlock;

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A single value or a list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// One attribute in list form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttributeInput {
    pub field_name: String,
    /// text|number|boolean|date|json|file_url; inferred from `value` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[schema(value_type = Object)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub validation_rules: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_searchable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
}

impl AttributeInput {
    pub fn new(field_name: impl Into<String>, value: Value) -> Self {
        Self {
            field_name: field_name.into(),
            field_type: None,
            value,
            smart_code: None,
            validation_rules: None,
            is_required: None,
            is_searchable: None,
            display_order: None,
        }
    }

    pub fn typed(field_name: impl Into<String>, field_type: &str, value: Value) -> Self {
        Self {
            field_type: Some(field_type.to_string()),
            ..Self::new(field_name, value)
        }
    }
}

/// Attributes as a `{field_name: value}` map or as an explicit list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeData {
    Map(Map<String, Value>),
    List(Vec<AttributeInput>),
}

impl AttributeData {
    /// Normalises both forms to a list; map entries infer their type.
    pub fn into_inputs(self) -> Vec<AttributeInput> {
        match self {
            AttributeData::Map(map) => map
                .into_iter()
                .map(|(field_name, value)| AttributeInput::new(field_name, value))
                .collect(),
            AttributeData::List(list) => list,
        }
    }
}

/// A relationship to create from the new entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RelationshipInput {
    pub relationship_type: String,
    /// Target named directly, within the same tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_entity_id: Option<String>,
    /// Target resolved by smart code lookup within the tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_smart_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_code: Option<String>,
    /// forward|backward|bidirectional (default: forward)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Link weight (default: 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

impl RelationshipInput {
    pub fn to_id(relationship_type: impl Into<String>, target: Uuid) -> Self {
        Self {
            target_entity_id: Some(target.to_string()),
            ..Self::empty(relationship_type)
        }
    }

    pub fn to_smart_code(relationship_type: impl Into<String>, smart_code: impl Into<String>) -> Self {
        Self {
            target_smart_code: Some(smart_code.into()),
            ..Self::empty(relationship_type)
        }
    }

    fn empty(relationship_type: impl Into<String>) -> Self {
        Self {
            relationship_type: relationship_type.into(),
            target_entity_id: None,
            target_smart_code: None,
            smart_code: None,
            direction: None,
            strength: None,
            effective_date: None,
            expiration_date: None,
            metadata: None,
        }
    }
}

/// Create an entity together with its attributes and relationships.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateEntityRequest {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub entity_name: String,
    #[serde(default)]
    pub entity_code: Option<String>,
    #[serde(default)]
    pub entity_description: Option<String>,
    #[serde(default)]
    pub parent_entity_id: Option<String>,
    /// Generated from the entity type when omitted
    #[serde(default)]
    pub smart_code: Option<String>,
    /// active|archived (default: active)
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub business_rules: Option<Value>,
    /// Attribute map or list
    #[serde(default, alias = "dynamic_data")]
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<AttributeData>,
    #[serde(default)]
    pub relationships: Option<Vec<RelationshipInput>>,
    #[serde(default)]
    pub actor_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateEntityResponse {
    pub success: bool,
    pub entity_id: Uuid,
    pub entity: entity::Model,
    pub created_attribute_ids: Vec<Uuid>,
    pub created_relationship_ids: Vec<Uuid>,
    pub performance: PerformanceBlock,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Attribute changes applied by an update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AttributeChanges {
    /// Map or list of fields to insert or overwrite
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub upsert: Option<AttributeData>,
    /// Field names to remove
    #[serde(default)]
    pub delete: Option<Vec<String>>,
}

/// Update any subset of an entity's columns plus its attributes.
///
/// Nullable columns distinguish an absent key (left untouched) from an
/// explicit `null` (cleared).
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateEntityRequest {
    #[serde(default)]
    pub tenant_id: String,
    /// Taken from the path when called over HTTP
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub entity_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub entity_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub entity_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub parent_entity_id: Option<Option<String>>,
    #[serde(default)]
    pub smart_code: Option<String>,
    /// active|archived|deleted
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<Vec<String>>)]
    pub tags: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Option<Value>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<Object>)]
    pub business_rules: Option<Option<Value>>,
    #[serde(default, alias = "dynamic_data")]
    pub attributes: Option<AttributeChanges>,
    #[serde(default)]
    pub actor_id: Option<String>,
}

/// Ids touched by the attribute part of an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttributeChangeSet {
    pub upserted: Vec<Uuid>,
    pub deleted: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateEntityResponse {
    pub success: bool,
    pub entity_id: Uuid,
    pub entity: entity::Model,
    pub changes: AttributeChangeSet,
    pub performance: PerformanceBlock,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// How the entity row itself is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Physically remove the row
    Hard,
    /// Keep the row with status `deleted`
    #[default]
    Soft,
    /// Keep the row with status `archived`
    Archive,
}

fn default_true() -> bool {
    true
}

/// Delete an entity, optionally cascading to attributes and relationships.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteEntityRequest {
    #[serde(default)]
    pub tenant_id: String,
    /// Taken from the path when called over HTTP
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub mode: DeleteMode,
    #[serde(default = "default_true")]
    pub cascade_relationships: bool,
    #[serde(default = "default_true")]
    pub cascade_attributes: bool,
}

impl DeleteEntityRequest {
    pub fn new(tenant_id: impl Into<String>, entity_id: impl Into<String>, mode: DeleteMode) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            entity_id: entity_id.into(),
            mode,
            cascade_relationships: true,
            cascade_attributes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeletedSummary {
    /// Whether the entity row was removed or changed state
    pub entity: bool,
    pub mode: DeleteMode,
    pub relationships: u64,
    pub attributes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteEntityResponse {
    pub success: bool,
    pub entity_id: Uuid,
    pub deleted: DeletedSummary,
    pub performance: PerformanceBlock,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Link an existing entity to another entity of the same tenant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkEntityRequest {
    #[serde(default)]
    pub tenant_id: String,
    /// Source of the relationship; taken from the path when called over HTTP
    #[serde(default)]
    pub entity_id: String,
    pub relationship: RelationshipInput,
    #[serde(default)]
    pub actor_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkEntityResponse {
    pub success: bool,
    pub entity_id: Uuid,
    pub relationship: relationship::Model,
    pub performance: PerformanceBlock,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// `true`/`false`, or the list of field names to include.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeExpansion {
    All(bool),
    Fields(Vec<String>),
}

/// `true`/`false`, or a detailed selection of sides and types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipExpansion {
    All(bool),
    Detailed {
        #[serde(default = "default_true")]
        incoming: bool,
        #[serde(default = "default_true")]
        outgoing: bool,
        #[serde(default)]
        types: Option<Vec<String>>,
    },
}

/// Filtered, paginated read with optional expansion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueryEntityRequest {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_ids: Option<Vec<String>>,
    /// One type or a list of types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<String>>)]
    pub entity_type: Option<OneOrMany<String>>,
    /// One smart code or a list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<String>>)]
    pub smart_code: Option<OneOrMany<String>>,
    /// One status or a list; deleted rows are excluded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<String>>)]
    pub status: Option<OneOrMany<String>>,
    /// created_at|updated_at|entity_name|entity_type|entity_code|smart_code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// asc|desc (default: desc)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_direction: Option<String>,
    /// 1..=1000 (default: 100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub include_attributes: Option<AttributeExpansion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub include_relationships: Option<RelationshipExpansion>,
}

impl QueryEntityRequest {
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Self::default()
        }
    }
}

/// Attribute as returned by a query, with the typed value flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttributeView {
    pub id: Uuid,
    pub field_name: String,
    pub field_type: String,
    #[schema(value_type = Object)]
    pub value: Value,
    pub smart_code: Option<String>,
    pub is_required: bool,
    pub is_searchable: bool,
    pub display_order: Option<i32>,
}

impl From<attribute::Model> for AttributeView {
    fn from(model: attribute::Model) -> Self {
        Self {
            value: model.value(),
            id: model.id,
            field_name: model.field_name,
            field_type: model.field_type,
            smart_code: model.smart_code,
            is_required: model.is_required,
            is_searchable: model.is_searchable,
            display_order: model.display_order,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RelationshipSides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming: Option<Vec<relationship::Model>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgoing: Option<Vec<relationship::Model>>,
}

/// One query hit with its optional expansions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EntityResult {
    #[serde(flatten)]
    pub entity: entity::Model,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<AttributeView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<RelationshipSides>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub limit: u64,
    pub offset: u64,
    pub returned: usize,
    /// True when the page was full
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryEntityResponse {
    pub success: bool,
    pub results: Vec<EntityResult>,
    pub pagination: Pagination,
    pub performance: PerformanceBlock,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

//! Attribute record model
//!
//! SeaORM model for the `core_dynamic_data` table. Each row carries one named,
//! typed value for an entity; exactly one `field_value_*` column is populated
//! and it matches `field_type`.

use chrono::{DateTime, FixedOffset};
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

/// Dynamic attribute value attached to an entity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "core_dynamic_data")]
#[schema(as = AttributeRecord)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    /// Owning entity
    pub entity_id: Uuid,

    /// Field name, unique per (tenant, entity)
    pub field_name: String,

    /// Declared type (text|number|boolean|date|json|file_url)
    pub field_type: String,

    pub field_value_text: Option<String>,

    pub field_value_number: Option<f64>,

    pub field_value_boolean: Option<bool>,

    #[schema(value_type = Option<String>, format = DateTime)]
    pub field_value_date: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    #[schema(value_type = Option<Object>)]
    pub field_value_json: Option<JsonValue>,

    pub field_value_file_url: Option<String>,

    pub smart_code: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    #[schema(value_type = Option<Object>)]
    pub validation_rules: Option<JsonValue>,

    pub is_required: bool,

    pub is_searchable: bool,

    /// Ordering hint for presentation layers
    pub display_order: Option<i32>,

    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,

    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Returns the populated value column as JSON, regardless of its type.
    pub fn value(&self) -> JsonValue {
        match FieldType::parse(&self.field_type) {
            Some(FieldType::Text) => self.field_value_text.clone().into(),
            Some(FieldType::Number) => self.field_value_number.into(),
            Some(FieldType::Boolean) => self.field_value_boolean.into(),
            Some(FieldType::Date) => self
                .field_value_date
                .map(|date| JsonValue::String(date.to_rfc3339()))
                .unwrap_or(JsonValue::Null),
            Some(FieldType::Json) => self.field_value_json.clone().unwrap_or(JsonValue::Null),
            Some(FieldType::FileUrl) => self.field_value_file_url.clone().into(),
            None => JsonValue::Null,
        }
    }
}

/// Closed set of attribute field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
    Json,
    #[serde(alias = "file-url")]
    FileUrl,
}

impl FieldType {
    pub const ALL: [FieldType; 6] = [
        Self::Text,
        Self::Number,
        Self::Boolean,
        Self::Date,
        Self::Json,
        Self::FileUrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Json => "json",
            FieldType::FileUrl => "file_url",
        }
    }

    /// Parses a declared type; `file-url` is accepted as an alias.
    pub fn parse(value: &str) -> Option<Self> {
        if value == "file-url" {
            return Some(Self::FileUrl);
        }
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that has already been type-checked against its [`FieldType`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<FixedOffset>),
    Json(JsonValue),
    FileUrl(String),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Text(_) => FieldType::Text,
            FieldValue::Number(_) => FieldType::Number,
            FieldValue::Boolean(_) => FieldType::Boolean,
            FieldValue::Date(_) => FieldType::Date,
            FieldValue::Json(_) => FieldType::Json,
            FieldValue::FileUrl(_) => FieldType::FileUrl,
        }
    }

    /// Writes this value into the matching column and clears every other
    /// value column, keeping the one-populated-column invariant on updates.
    pub fn apply_to(self, active: &mut ActiveModel) {
        use sea_orm::Set;

        active.field_type = Set(self.field_type().as_str().to_string());
        active.field_value_text = Set(None);
        active.field_value_number = Set(None);
        active.field_value_boolean = Set(None);
        active.field_value_date = Set(None);
        active.field_value_json = Set(None);
        active.field_value_file_url = Set(None);

        match self {
            FieldValue::Text(text) => active.field_value_text = Set(Some(text)),
            FieldValue::Number(number) => active.field_value_number = Set(Some(number)),
            FieldValue::Boolean(flag) => active.field_value_boolean = Set(Some(flag)),
            FieldValue::Date(date) => active.field_value_date = Set(Some(date)),
            FieldValue::Json(json) => active.field_value_json = Set(Some(json)),
            FieldValue::FileUrl(url) => active.field_value_file_url = Set(Some(url)),
        }
    }
}

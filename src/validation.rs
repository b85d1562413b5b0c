//! # Request Validation
//!
//! Pure checks run before any composer step is registered. Nothing in this
//! module touches the store; a failure here means zero side effects.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate};
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::error::CrudError;
use crate::models::attribute::{FieldType, FieldValue};

pub const MAX_ENTITY_TYPE_LEN: usize = 50;
pub const MAX_ENTITY_NAME_LEN: usize = 255;
pub const MAX_FIELD_NAME_LEN: usize = 100;
pub const MAX_QUERY_LIMIT: u64 = 1000;

static SMART_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][A-Z0-9]*(\.[A-Z0-9_]+){4}\.V[0-9]+$").expect("smart code regex")
});

static ENTITY_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("entity type regex"));

static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("field name regex"));

/// Parses and checks the tenant identifier.
pub fn tenant_id(value: &str) -> Result<Uuid, CrudError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CrudError::tenant("tenant_id is required"));
    }
    Uuid::parse_str(trimmed)
        .map_err(|_| CrudError::tenant(format!("tenant_id '{trimmed}' is not a valid UUID")))
}

/// Parses an entity identifier carried in `field`.
pub fn entity_id(field: &str, value: &str) -> Result<Uuid, CrudError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CrudError::validation(field, format!("{field} is required")));
    }
    Uuid::parse_str(trimmed).map_err(|_| {
        CrudError::validation(field, format!("{field} '{trimmed}' is not a valid UUID"))
    })
}

pub fn entity_type(value: &str) -> Result<(), CrudError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CrudError::validation("entity_type", "entity_type is required"));
    }
    if value.chars().count() > MAX_ENTITY_TYPE_LEN {
        return Err(CrudError::validation(
            "entity_type",
            format!("entity_type cannot exceed {MAX_ENTITY_TYPE_LEN} characters"),
        ));
    }
    if !ENTITY_TYPE.is_match(value) {
        return Err(CrudError::validation(
            "entity_type",
            "entity_type may only contain letters, digits and underscores and must start with a letter",
        ));
    }
    Ok(())
}

pub fn entity_name(value: &str) -> Result<(), CrudError> {
    if value.trim().is_empty() {
        return Err(CrudError::validation("entity_name", "entity_name is required"));
    }
    if value.chars().count() > MAX_ENTITY_NAME_LEN {
        return Err(CrudError::validation(
            "entity_name",
            format!("entity_name cannot exceed {MAX_ENTITY_NAME_LEN} characters"),
        ));
    }
    Ok(())
}

/// Returns true when `value` is a well-formed smart code.
pub fn is_smart_code(value: &str) -> bool {
    SMART_CODE.is_match(value)
}

/// Checks the `NAMESPACE.SEGMENT.SEGMENT.SEGMENT.SEGMENT.V<n>` format.
pub fn smart_code(field: &str, value: &str) -> Result<(), CrudError> {
    if is_smart_code(value) {
        Ok(())
    } else {
        Err(CrudError::SmartCodeFormat {
            value: value.to_string(),
            field: field.to_string(),
        })
    }
}

pub fn field_name(value: &str) -> Result<(), CrudError> {
    if value.trim().is_empty() {
        return Err(CrudError::validation("field_name", "field_name is required"));
    }
    if value.len() > MAX_FIELD_NAME_LEN || !FIELD_NAME.is_match(value) {
        return Err(CrudError::validation(
            "field_name",
            format!(
                "field_name '{value}' must be lower snake_case and at most {MAX_FIELD_NAME_LEN} characters"
            ),
        ));
    }
    Ok(())
}

pub fn field_type(value: &str) -> Result<FieldType, CrudError> {
    FieldType::parse(value).ok_or_else(|| {
        CrudError::validation(
            "field_type",
            format!(
                "field_type '{value}' is not one of text, number, boolean, date, json, file_url"
            ),
        )
    })
}

/// Infers the field type of an untyped attribute-map value.
pub fn infer_field_type(name: &str, value: &Value) -> Result<FieldType, CrudError> {
    match value {
        Value::String(_) => Ok(FieldType::Text),
        Value::Number(_) => Ok(FieldType::Number),
        Value::Bool(_) => Ok(FieldType::Boolean),
        Value::Object(_) | Value::Array(_) => Ok(FieldType::Json),
        Value::Null => Err(CrudError::AttributeType {
            field_name: name.to_string(),
            expected: "a non-null value".to_string(),
            message: "null cannot be stored; list the field under delete instead".to_string(),
        }),
    }
}

fn mismatch(name: &str, expected: FieldType, message: impl Into<String>) -> CrudError {
    CrudError::AttributeType {
        field_name: name.to_string(),
        expected: expected.to_string(),
        message: message.into(),
    }
}

fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Type-checks `value` against the declared `kind`.
pub fn field_value(name: &str, kind: FieldType, value: &Value) -> Result<FieldValue, CrudError> {
    match kind {
        FieldType::Text => match value {
            Value::String(text) => Ok(FieldValue::Text(text.clone())),
            _ => Err(mismatch(name, kind, "expected a string")),
        },
        FieldType::Number => {
            let number = match value {
                Value::Number(number) => number.as_f64(),
                _ => None,
            };
            match number {
                Some(number) if number.is_finite() => Ok(FieldValue::Number(number)),
                _ => Err(mismatch(name, kind, "expected a finite number")),
            }
        }
        FieldType::Boolean => match value {
            Value::Bool(flag) => Ok(FieldValue::Boolean(*flag)),
            _ => Err(mismatch(name, kind, "expected true or false")),
        },
        FieldType::Date => match value.as_str().and_then(parse_date) {
            Some(date) => Ok(FieldValue::Date(date)),
            None => Err(mismatch(
                name,
                kind,
                "expected an RFC 3339 timestamp or YYYY-MM-DD date",
            )),
        },
        FieldType::Json => match value {
            Value::Null => Err(mismatch(name, kind, "expected a JSON value, got null")),
            other => Ok(FieldValue::Json(other.clone())),
        },
        FieldType::FileUrl => {
            let parsed = value.as_str().and_then(|raw| url::Url::parse(raw).ok());
            match parsed {
                Some(url) if matches!(url.scheme(), "http" | "https") => {
                    Ok(FieldValue::FileUrl(url.to_string()))
                }
                _ => Err(mismatch(name, kind, "expected an http(s) URL")),
            }
        }
    }
}

/// Parses an optional RFC 3339 timestamp carried in `field`.
pub fn timestamp(field: &str, value: &str) -> Result<DateTime<FixedOffset>, CrudError> {
    parse_date(value).ok_or_else(|| {
        CrudError::validation(field, format!("{field} '{value}' is not a valid date"))
    })
}

/// Checks a relationship target and returns the parsed direct id, if given.
///
/// Exactly one way of naming the target must be present.
pub fn relationship_target(
    index: usize,
    relationship_type: &str,
    target_entity_id: Option<&str>,
    target_smart_code: Option<&str>,
) -> Result<Option<Uuid>, CrudError> {
    if relationship_type.trim().is_empty() {
        return Err(CrudError::validation(
            format!("relationships[{index}].relationship_type"),
            "relationship_type is required",
        ));
    }

    match (target_entity_id, target_smart_code) {
        (Some(_), Some(_)) => Err(CrudError::relationship(
            format!("relationships[{index}]"),
            "relationship takes target_entity_id or target_smart_code, not both",
        )),
        (Some(id), None) => {
            entity_id(&format!("relationships[{index}].target_entity_id"), id).map(Some)
        }
        (None, Some(code)) => {
            smart_code(&format!("relationships[{index}].target_smart_code"), code)?;
            Ok(None)
        }
        (None, None) => Err(CrudError::relationship(
            format!("relationships[{index}]"),
            "relationship needs either target_entity_id or target_smart_code",
        )),
    }
}

pub fn limit(value: u64) -> Result<(), CrudError> {
    if value == 0 || value > MAX_QUERY_LIMIT {
        return Err(CrudError::validation(
            "limit",
            format!("limit must be between 1 and {MAX_QUERY_LIMIT}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_canonical_smart_code() {
        assert!(smart_code("smart_code", "HERA.CRM.CUSTOMER.ENTITY.PROFILE.V1").is_ok());
        assert!(is_smart_code("HERA.SALON.SVC_APPT.ENTITY.BOOKING.V12"));
    }

    #[test]
    fn rejects_malformed_smart_codes() {
        let err = smart_code("smart_code", "INVALID_FORMAT").unwrap_err();
        assert_eq!(err.code(), "SMART_CODE_FORMAT_ERROR");

        for bad in [
            "hera.crm.customer.entity.profile.v1",
            "HERA.CRM.CUSTOMER.ENTITY.V1",
            "HERA.CRM.CUSTOMER.ENTITY.PROFILE.EXTRA.V1",
            "HERA.CRM.CUSTOMER.ENTITY.PROFILE.V",
            "HERA.CRM.CUSTOMER.ENTITY.PROFILE.v1",
            "",
        ] {
            assert!(!is_smart_code(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn tenant_id_must_be_uuid() {
        assert_eq!(tenant_id("").unwrap_err().code(), "TENANT_CONTEXT_ERROR");
        assert_eq!(
            tenant_id("not-a-uuid").unwrap_err().code(),
            "TENANT_CONTEXT_ERROR"
        );
        let id = Uuid::new_v4();
        assert_eq!(tenant_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn entity_type_rules() {
        assert!(entity_type("customer").is_ok());
        assert!(entity_type("gl_account").is_ok());
        assert!(entity_type("").is_err());
        assert!(entity_type("has space").is_err());
        assert!(entity_type("1customer").is_err());
        assert!(entity_type(&"a".repeat(51)).is_err());
    }

    #[test]
    fn entity_name_rules() {
        assert!(entity_name("Acme Corp").is_ok());
        assert!(entity_name("   ").is_err());
        assert!(entity_name(&"x".repeat(256)).is_err());
        assert!(entity_name(&"x".repeat(255)).is_ok());
    }

    #[test]
    fn field_values_type_check() {
        assert_eq!(
            field_value("age", FieldType::Number, &json!(42)).unwrap(),
            FieldValue::Number(42.0)
        );
        assert!(field_value("age", FieldType::Number, &json!("42")).is_err());
        assert!(field_value("vip", FieldType::Boolean, &json!("true")).is_err());
        assert!(field_value("vip", FieldType::Boolean, &json!(true)).is_ok());
        assert!(field_value("born", FieldType::Date, &json!("1990-05-01")).is_ok());
        assert!(field_value("born", FieldType::Date, &json!("2024-01-15T10:30:00Z")).is_ok());
        assert!(field_value("born", FieldType::Date, &json!("yesterday")).is_err());
        assert!(field_value("doc", FieldType::FileUrl, &json!("https://cdn.example.com/a.pdf")).is_ok());
        assert!(field_value("doc", FieldType::FileUrl, &json!("ftp://example.com/a")).is_err());
        assert!(field_value("prefs", FieldType::Json, &json!({"a": 1})).is_ok());
        assert!(field_value("prefs", FieldType::Json, &Value::Null).is_err());
    }

    #[test]
    fn attribute_type_errors_name_the_field() {
        let err = field_value("age", FieldType::Number, &json!("old")).unwrap_err();
        assert_eq!(err.code(), "ATTRIBUTE_TYPE_ERROR");
        assert_eq!(err.field(), Some("age"));
    }

    #[test]
    fn infers_types_from_map_values() {
        assert_eq!(infer_field_type("a", &json!("x")).unwrap(), FieldType::Text);
        assert_eq!(infer_field_type("a", &json!(1.5)).unwrap(), FieldType::Number);
        assert_eq!(infer_field_type("a", &json!(false)).unwrap(), FieldType::Boolean);
        assert_eq!(infer_field_type("a", &json!([1])).unwrap(), FieldType::Json);
        assert!(infer_field_type("a", &Value::Null).is_err());
    }

    #[test]
    fn field_names_are_snake_case() {
        assert!(field_name("email").is_ok());
        assert!(field_name("loyalty_tier_2").is_ok());
        assert!(field_name("Email").is_err());
        assert!(field_name("").is_err());
    }

    #[test]
    fn relationship_needs_a_target() {
        let err = relationship_target(0, "customer_of", None, None).unwrap_err();
        assert_eq!(err.code(), "RELATIONSHIP_ERROR");

        let err = relationship_target(1, "", Some("x"), None).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = relationship_target(0, "customer_of", Some("nope"), None).unwrap_err();
        assert_eq!(err.field(), Some("relationships[0].target_entity_id"));

        let target = Uuid::new_v4().to_string();
        assert!(
            relationship_target(0, "customer_of", Some(&target), None)
                .unwrap()
                .is_some()
        );
        assert!(
            relationship_target(0, "customer_of", None, Some("HERA.CRM.ORG.ENTITY.PROFILE.V1"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn relationship_target_rejects_id_and_smart_code_together() {
        let target = Uuid::new_v4().to_string();
        let err = relationship_target(
            2,
            "customer_of",
            Some(&target),
            Some("HERA.CRM.ORG.ENTITY.PROFILE.V1"),
        )
        .unwrap_err();
        assert_eq!(err.code(), "RELATIONSHIP_ERROR");
        assert_eq!(err.field(), Some("relationships[2]"));
    }

    #[test]
    fn limit_bounds() {
        assert!(limit(0).is_err());
        assert!(limit(1).is_ok());
        assert!(limit(1000).is_ok());
        assert!(limit(1001).is_err());
    }
}

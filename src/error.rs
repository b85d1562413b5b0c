//! # Error Handling
//!
//! Closed error taxonomy for the CRUD engine and the uniform error envelope
//! returned to callers. Every failure (validator, composer step, store,
//! anything else) passes through [`classify`] and comes out as an
//! [`ErrorEnvelope`] with a stable code, the operation and the failing stage.

use std::time::Duration;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::operations::OperationKind;
use crate::telemetry;

/// Sub-classification of underlying store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoreFailure {
    /// Unique / foreign key / not-null / check violations
    ConstraintViolation,
    /// Missing table or column, malformed statement
    SchemaOrSyntax,
    /// Pool or socket level failure
    Connection,
    /// Anything else the driver reports
    Other,
}

/// Every failure the engine can produce.
#[derive(Debug, Error)]
pub enum CrudError {
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },
    #[error("{message}")]
    TenantContext { message: String },
    #[error("invalid smart code '{value}'")]
    SmartCodeFormat { value: String, field: String },
    #[error("attribute '{field_name}' does not match type {expected}: {message}")]
    AttributeType {
        field_name: String,
        expected: String,
        message: String,
    },
    #[error("{message}")]
    Relationship {
        message: String,
        field: Option<String>,
    },
    #[error("entity {entity_id} not found for tenant {tenant_id}")]
    EntityNotFound { entity_id: Uuid, tenant_id: Uuid },
    #[error("transaction failed: {message}")]
    Transaction { message: String },
    #[error("operation took {elapsed_ms:.2}ms, budget is {budget_ms}ms")]
    PerformanceBudget { elapsed_ms: f64, budget_ms: u64 },
    #[error("database error: {message}")]
    Store { kind: StoreFailure, message: String },
    #[error("timed out: {message}")]
    Timeout { message: String },
    #[error("{message}")]
    Unknown { message: String },
}

impl CrudError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CrudError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn tenant(message: impl Into<String>) -> Self {
        CrudError::TenantContext {
            message: message.into(),
        }
    }

    pub fn relationship(field: impl Into<String>, message: impl Into<String>) -> Self {
        CrudError::Relationship {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        CrudError::Transaction {
            message: message.into(),
        }
    }

    /// Stable, transport-independent error code.
    pub fn code(&self) -> &'static str {
        match self {
            CrudError::Validation { .. } => "VALIDATION_ERROR",
            CrudError::TenantContext { .. } => "TENANT_CONTEXT_ERROR",
            CrudError::SmartCodeFormat { .. } => "SMART_CODE_FORMAT_ERROR",
            CrudError::AttributeType { .. } => "ATTRIBUTE_TYPE_ERROR",
            CrudError::Relationship { .. } => "RELATIONSHIP_ERROR",
            CrudError::EntityNotFound { .. } => "ENTITY_NOT_FOUND",
            CrudError::Transaction { .. } => "TRANSACTION_ERROR",
            CrudError::PerformanceBudget { .. } => "PERFORMANCE_BUDGET_EXCEEDED",
            CrudError::Store { kind, .. } => match kind {
                StoreFailure::ConstraintViolation => "DATABASE_CONSTRAINT_VIOLATION",
                StoreFailure::SchemaOrSyntax => "DATABASE_SCHEMA_ERROR",
                StoreFailure::Connection => "DATABASE_CONNECTION_ERROR",
                StoreFailure::Other => "DATABASE_ERROR",
            },
            CrudError::Timeout { .. } => "NETWORK_TIMEOUT",
            CrudError::Unknown { .. } => "UNKNOWN_ERROR",
        }
    }

    /// Offending request field, when the failure is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            CrudError::Validation { field, .. } | CrudError::Relationship { field, .. } => {
                field.as_deref()
            }
            CrudError::SmartCodeFormat { field, .. } => Some(field),
            CrudError::AttributeType { field_name, .. } => Some(field_name),
            CrudError::TenantContext { .. } => Some("tenant_id"),
            CrudError::EntityNotFound { .. } => Some("entity_id"),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            CrudError::Validation { .. }
            | CrudError::TenantContext { .. }
            | CrudError::SmartCodeFormat { .. }
            | CrudError::AttributeType { .. } => StatusCode::BAD_REQUEST,
            CrudError::Relationship { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CrudError::EntityNotFound { .. } => StatusCode::NOT_FOUND,
            CrudError::Store {
                kind: StoreFailure::ConstraintViolation,
                ..
            } => StatusCode::CONFLICT,
            CrudError::Store {
                kind: StoreFailure::Connection,
                ..
            } => StatusCode::SERVICE_UNAVAILABLE,
            CrudError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CrudError::Transaction { .. }
            | CrudError::PerformanceBudget { .. }
            | CrudError::Store { .. }
            | CrudError::Unknown { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show callers. Store and unknown failures are reduced to
    /// a generic sentence; the driver text only travels in `diagnostic`.
    fn public_message(&self) -> String {
        match self {
            CrudError::Store { kind, .. } => match kind {
                StoreFailure::ConstraintViolation => {
                    "A uniqueness or integrity constraint was violated".to_string()
                }
                StoreFailure::SchemaOrSyntax => "The data store rejected the statement".to_string(),
                StoreFailure::Connection => "The data store is unavailable".to_string(),
                StoreFailure::Other => "A data store error occurred".to_string(),
            },
            CrudError::Unknown { .. } => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            CrudError::SmartCodeFormat { value, .. } => Some(serde_json::json!({
                "value": value,
                "expected_format": "NAMESPACE.SEGMENT.SEGMENT.SEGMENT.SEGMENT.V<n>",
            })),
            CrudError::AttributeType { expected, .. } => {
                Some(serde_json::json!({ "expected_type": expected }))
            }
            CrudError::EntityNotFound {
                entity_id,
                tenant_id,
            } => Some(serde_json::json!({
                "entity_id": entity_id,
                "tenant_id": tenant_id,
            })),
            CrudError::PerformanceBudget {
                elapsed_ms,
                budget_ms,
            } => Some(serde_json::json!({
                "elapsed_ms": elapsed_ms,
                "budget_ms": budget_ms,
            })),
            CrudError::Store { kind, .. } => Some(serde_json::json!({ "store_failure": kind })),
            _ => None,
        }
    }
}

/// Checks whether a SeaORM error is a unique constraint violation, across the
/// Postgres and SQLite drivers.
pub fn is_unique_violation(error: &DbErr) -> bool {
    matches!(error.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn classify_sqlx(error: &sea_orm::sqlx::Error) -> (StoreFailure, bool) {
    use sea_orm::sqlx::Error as SqlxError;
    use sea_orm::sqlx::error::ErrorKind;

    const PG_SYNTAX_OR_ACCESS_CLASS: &str = "42";
    const PG_INTEGRITY_CLASS: &str = "23";

    match error {
        SqlxError::PoolTimedOut => (StoreFailure::Connection, true),
        SqlxError::Io(_)
        | SqlxError::Tls(_)
        | SqlxError::PoolClosed
        | SqlxError::WorkerCrashed
        | SqlxError::Configuration(_) => (StoreFailure::Connection, false),
        SqlxError::ColumnNotFound(_) | SqlxError::ColumnIndexOutOfBounds { .. } => {
            (StoreFailure::SchemaOrSyntax, false)
        }
        SqlxError::Database(db_error) => match db_error.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => (StoreFailure::ConstraintViolation, false),
            _ => match db_error.code() {
                Some(code) if code.starts_with(PG_INTEGRITY_CLASS) => {
                    (StoreFailure::ConstraintViolation, false)
                }
                Some(code) if code.starts_with(PG_SYNTAX_OR_ACCESS_CLASS) => {
                    (StoreFailure::SchemaOrSyntax, false)
                }
                _ => (StoreFailure::Other, false),
            },
        },
        _ => (StoreFailure::Other, false),
    }
}

impl From<DbErr> for CrudError {
    fn from(error: DbErr) -> Self {
        if let Some(sql_err) = error.sql_err() {
            match sql_err {
                SqlErr::UniqueConstraintViolation(message)
                | SqlErr::ForeignKeyConstraintViolation(message) => {
                    return CrudError::Store {
                        kind: StoreFailure::ConstraintViolation,
                        message,
                    };
                }
                _ => {}
            }
        }

        let message = error.to_string();
        match &error {
            DbErr::ConnectionAcquire(sea_orm::ConnAcquireErr::Timeout) => {
                CrudError::Timeout { message }
            }
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => CrudError::Store {
                kind: StoreFailure::Connection,
                message,
            },
            DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
            | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => match classify_sqlx(sqlx_err) {
                (_, true) => CrudError::Timeout { message },
                (kind, false) => CrudError::Store { kind, message },
            },
            DbErr::Type(_) | DbErr::Json(_) | DbErr::TryIntoErr { .. } => CrudError::Store {
                kind: StoreFailure::SchemaOrSyntax,
                message,
            },
            _ => CrudError::Store {
                kind: StoreFailure::Other,
                message,
            },
        }
    }
}

impl From<anyhow::Error> for CrudError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<CrudError>() {
            Ok(known) => known,
            Err(error) => match error.downcast::<DbErr>() {
                Ok(db_err) => db_err.into(),
                Err(other) => CrudError::Unknown {
                    message: format!("{other:#}"),
                },
            },
        }
    }
}

/// Stage of an operation at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    AtomicTransaction,
    DatabaseOperation,
    QueryExecution,
    CacheLookup,
    ResponseMapping,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::AtomicTransaction => "atomic_transaction",
            Stage::DatabaseOperation => "database_operation",
            Stage::QueryExecution => "query_execution",
            Stage::CacheLookup => "cache_lookup",
            Stage::ResponseMapping => "response_mapping",
        }
    }
}

/// A [`CrudError`] together with the stage where it was raised.
#[derive(Debug)]
pub struct OperationFailure {
    pub stage: Stage,
    pub error: CrudError,
}

/// Tags results with the stage they belong to.
pub trait AtStage<T> {
    fn at_stage(self, stage: Stage) -> Result<T, OperationFailure>;
}

impl<T, E> AtStage<T> for Result<T, E>
where
    E: Into<CrudError>,
{
    fn at_stage(self, stage: Stage) -> Result<T, OperationFailure> {
        self.map_err(|error| OperationFailure {
            stage,
            error: error.into(),
        })
    }
}

/// One entry of the `errors` list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub operation: String,
}

/// Timing attached to a failed call.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FailurePerformance {
    pub elapsed_ms: f64,
    pub stage: Stage,
}

/// Uniform error response for every operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    /// HTTP status code for the response
    #[serde(skip)]
    pub status: StatusCode,
    /// Always false
    pub success: bool,
    /// Top-level code callers can branch on
    pub error_code: String,
    pub errors: Vec<ErrorDetail>,
    pub performance: FailurePerformance,
    /// Raw failure text, only populated when diagnostics are enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    /// Correlation trace ID for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl Default for ErrorEnvelope {
    fn default() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            success: false,
            error_code: "UNKNOWN_ERROR".to_string(),
            errors: Vec::new(),
            performance: FailurePerformance {
                elapsed_ms: 0.0,
                stage: Stage::Validation,
            },
            diagnostic: None,
            trace_id: None,
        }
    }
}

impl ErrorEnvelope {
    /// Primary error entry, if any.
    pub fn first(&self) -> Option<&ErrorDetail> {
        self.errors.first()
    }

    fn current_trace_id() -> Option<String> {
        telemetry::current_trace_id().or_else(|| Some(telemetry::new_trace_id()))
    }
}

/// Turns any failure into the uniform envelope.
///
/// Known kinds are reshaped as-is; store and foreign failures have already
/// been mapped onto the closed taxonomy by the `From` impls on [`CrudError`].
pub fn classify(
    failure: OperationFailure,
    operation: OperationKind,
    elapsed: Duration,
    with_diagnostic: bool,
) -> ErrorEnvelope {
    let OperationFailure { stage, error } = failure;

    match &error {
        CrudError::Store { .. } | CrudError::Unknown { .. } | CrudError::Transaction { .. } => {
            tracing::error!(
                operation = operation.name(),
                stage = stage.as_str(),
                code = error.code(),
                error = %error,
                "Operation failed"
            );
        }
        _ => {
            tracing::warn!(
                operation = operation.name(),
                stage = stage.as_str(),
                code = error.code(),
                error = %error,
                "Operation rejected"
            );
        }
    }

    let detail = ErrorDetail {
        code: error.code().to_string(),
        message: error.public_message(),
        details: error.details(),
        field: error.field().map(str::to_string),
        operation: operation.name().to_string(),
    };

    ErrorEnvelope {
        status: error.status_code(),
        success: false,
        error_code: detail.code.clone(),
        errors: vec![detail],
        performance: FailurePerformance {
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            stage,
        },
        diagnostic: with_diagnostic.then(|| format!("{error:?}")),
        trace_id: ErrorEnvelope::current_trace_id(),
    }
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl ErrorEnvelope {
    /// Envelope for a request that could not be decoded at all.
    fn undecodable(message: String) -> Self {
        ErrorEnvelope {
            status: StatusCode::BAD_REQUEST,
            error_code: "VALIDATION_ERROR".to_string(),
            errors: vec![ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message,
                details: None,
                field: None,
                operation: "request_decoding".to_string(),
            }],
            trace_id: ErrorEnvelope::current_trace_id(),
            ..Default::default()
        }
    }
}

impl From<JsonRejection> for ErrorEnvelope {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };
        ErrorEnvelope::undecodable(message)
    }
}

impl From<QueryRejection> for ErrorEnvelope {
    fn from(rejection: QueryRejection) -> Self {
        ErrorEnvelope::undecodable(format!("Invalid query string: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(stage: Stage, error: CrudError) -> OperationFailure {
        OperationFailure { stage, error }
    }

    #[test]
    fn test_known_kind_is_reshaped() {
        let envelope = classify(
            failure(
                Stage::Validation,
                CrudError::SmartCodeFormat {
                    value: "INVALID_FORMAT".to_string(),
                    field: "smart_code".to_string(),
                },
            ),
            OperationKind::Create,
            Duration::from_millis(3),
            false,
        );

        assert!(!envelope.success);
        assert_eq!(envelope.error_code, "SMART_CODE_FORMAT_ERROR");
        assert_eq!(envelope.status, StatusCode::BAD_REQUEST);
        let first = envelope.first().unwrap();
        assert_eq!(first.field.as_deref(), Some("smart_code"));
        assert_eq!(first.operation, "create_entity_complete");
        assert_eq!(envelope.performance.stage, Stage::Validation);
        assert!(envelope.performance.elapsed_ms >= 0.0);
        assert!(envelope.diagnostic.is_none());
    }

    #[test]
    fn test_record_not_found_maps_to_store_other() {
        let error: CrudError = DbErr::RecordNotFound("core_entities".to_string()).into();
        assert_eq!(error.code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_connection_error_maps_to_connection_kind() {
        let error: CrudError =
            DbErr::Conn(RuntimeErr::Internal("connection refused".to_string())).into();
        assert_eq!(error.code(), "DATABASE_CONNECTION_ERROR");
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_acquire_timeout_maps_to_timeout() {
        let error: CrudError = DbErr::ConnectionAcquire(sea_orm::ConnAcquireErr::Timeout).into();
        assert_eq!(error.code(), "NETWORK_TIMEOUT");
    }

    #[test]
    fn test_foreign_failure_falls_back_to_unknown() {
        let error: CrudError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(error.code(), "UNKNOWN_ERROR");

        let envelope = classify(
            failure(Stage::DatabaseOperation, error),
            OperationKind::Update,
            Duration::from_millis(1),
            true,
        );
        assert_eq!(envelope.error_code, "UNKNOWN_ERROR");
        assert_eq!(envelope.first().unwrap().message, "An unexpected error occurred");
        assert!(envelope.diagnostic.unwrap().contains("disk on fire"));
    }

    #[test]
    fn test_anyhow_preserves_known_kind() {
        let wrapped = anyhow::Error::new(CrudError::tenant("tenant_id is required"));
        let error: CrudError = wrapped.into();
        assert_eq!(error.code(), "TENANT_CONTEXT_ERROR");
    }

    #[test]
    fn test_store_message_not_leaked() {
        let envelope = classify(
            failure(
                Stage::AtomicTransaction,
                CrudError::Store {
                    kind: StoreFailure::ConstraintViolation,
                    message: "UNIQUE constraint failed: core_dynamic_data.field_name".to_string(),
                },
            ),
            OperationKind::Create,
            Duration::ZERO,
            false,
        );

        assert_eq!(envelope.error_code, "DATABASE_CONSTRAINT_VIOLATION");
        assert_eq!(envelope.status, StatusCode::CONFLICT);
        assert!(!envelope.first().unwrap().message.contains("core_dynamic_data"));
    }

    #[test]
    fn test_content_type_header() {
        let envelope = classify(
            failure(Stage::Validation, CrudError::validation("entity_name", "required")),
            OperationKind::Create,
            Duration::ZERO,
            false,
        );

        let response = envelope.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }

    #[test]
    fn test_trace_id_generation() {
        let envelope = classify(
            failure(Stage::QueryExecution, CrudError::transaction("boom")),
            OperationKind::Query,
            Duration::ZERO,
            false,
        );

        let trace_id = envelope.trace_id.unwrap();
        assert!(trace_id.starts_with("corr-"));
        assert_eq!(trace_id.len(), 13);
    }
}

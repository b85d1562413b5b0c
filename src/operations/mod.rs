//! # Entity Lifecycle Operations
//!
//! [`CrudEngine`] exposes the four composite operations (create, update,
//! delete and query), the follow-up link operation and the health probe.
//! Every call is validated before it touches the store, mutations run through
//! the transaction composer, and the performance monitor times every outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{AppConfig, SmartCodeConfig};
use crate::db;
use crate::error::{CrudError, ErrorEnvelope, OperationFailure, classify};
use crate::models::attribute::FieldType;
use crate::performance::{Measurement, PerformanceBlock, PerformanceMonitor, PerformanceReport};
use crate::repositories::AttributeWrite;
use crate::validation;

mod create;
mod delete;
mod link;
mod query;
pub mod steps;
pub mod types;
mod update;

pub use types::*;

/// The four operation categories, each with its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    Query,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [Self::Create, Self::Update, Self::Delete, Self::Query];

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Create => "create_entity_complete",
            OperationKind::Update => "update_entity_complete",
            OperationKind::Delete => "delete_entity_complete",
            OperationKind::Query => "query_entity_complete",
        }
    }

    /// Optimization tags reported in the performance block.
    pub fn optimizations(&self) -> &'static [&'static str] {
        match self {
            OperationKind::Create => &[
                "atomic_transaction",
                "batched_attribute_insert",
                "in_transaction_target_resolution",
            ],
            OperationKind::Update => &[
                "atomic_transaction",
                "column_subset_update",
                "keyed_attribute_upsert",
            ],
            OperationKind::Delete => &["atomic_transaction", "cascade_delete"],
            OperationKind::Query => &[
                "indexed_tenant_filter",
                "scoped_expansion",
                "result_cache",
            ],
        }
    }
}

/// Overall status reported by the health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health probe response used by collaborators to gate traffic.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub response_time_ms: f64,
    pub operations: Vec<String>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Entry point for every entity operation. Cheap to clone; clones share the
/// connection pool and the performance monitor.
#[derive(Clone)]
pub struct CrudEngine {
    db: DatabaseConnection,
    monitor: Arc<PerformanceMonitor>,
    smart_codes: SmartCodeConfig,
    expose_diagnostics: bool,
}

impl CrudEngine {
    pub fn new(db: DatabaseConnection, config: &AppConfig) -> Self {
        Self {
            db,
            monitor: Arc::new(PerformanceMonitor::new(config.performance.clone())),
            smart_codes: config.smart_code.clone(),
            expose_diagnostics: config.expose_diagnostics,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    pub async fn performance_report(&self) -> PerformanceReport {
        self.monitor.report().await
    }

    /// Runs `SELECT 1`; slower than the query budget counts as degraded.
    pub async fn health(&self) -> HealthReport {
        let started = Instant::now();
        let probe = db::health_check(&self.db).await;
        let elapsed = started.elapsed();
        let response_time_ms = elapsed.as_secs_f64() * 1_000.0;
        let budget = Duration::from_millis(self.monitor.budget_ms(OperationKind::Query));

        let (status, error) = match probe {
            Err(err) => {
                tracing::error!(error = %err, "Health probe failed");
                (HealthStatus::Unhealthy, Some("data store unreachable".to_string()))
            }
            Ok(()) if elapsed > budget => (HealthStatus::Degraded, None),
            Ok(()) => (HealthStatus::Healthy, None),
        };

        HealthReport {
            status,
            response_time_ms,
            operations: OperationKind::ALL
                .iter()
                .map(|operation| operation.name().to_string())
                .collect(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            error,
        }
    }

    /// Records a successful call and returns its block plus any budget warning.
    async fn succeed(
        &self,
        operation: OperationKind,
        tenant_id: Uuid,
        started: Instant,
        store_calls: u32,
        cache_hit: bool,
    ) -> (PerformanceBlock, Vec<String>) {
        let block = self
            .monitor
            .record(Measurement {
                operation,
                tenant_id: Some(tenant_id),
                elapsed: started.elapsed(),
                store_calls,
                cache_hit,
                success: true,
            })
            .await;
        let warnings = block.budget_warning(operation).into_iter().collect();
        (block, warnings)
    }

    /// Records a failed call and renders the uniform envelope.
    async fn reject(
        &self,
        operation: OperationKind,
        tenant_id: Option<Uuid>,
        started: Instant,
        failure: OperationFailure,
    ) -> ErrorEnvelope {
        let elapsed = started.elapsed();
        self.monitor
            .record(Measurement {
                operation,
                tenant_id,
                elapsed,
                store_calls: 0,
                cache_hit: false,
                success: false,
            })
            .await;
        classify(failure, operation, elapsed, self.expose_diagnostics)
    }
}

/// Validates attribute inputs into writes; `path` prefixes field paths in
/// error messages (e.g. `attributes`, `attributes.upsert`).
fn attribute_writes(path: &str, inputs: Vec<AttributeInput>) -> Result<Vec<AttributeWrite>, CrudError> {
    let mut writes: Vec<AttributeWrite> = Vec::with_capacity(inputs.len());

    for (index, input) in inputs.into_iter().enumerate() {
        validation::field_name(&input.field_name)?;
        if writes.iter().any(|write| write.field_name == input.field_name) {
            return Err(CrudError::validation(
                format!("{path}[{index}].field_name"),
                format!("field '{}' is listed more than once", input.field_name),
            ));
        }

        let kind: FieldType = match input.field_type.as_deref() {
            Some(declared) => validation::field_type(declared)?,
            None => validation::infer_field_type(&input.field_name, &input.value)?,
        };
        let value = validation::field_value(&input.field_name, kind, &input.value)?;

        if let Some(code) = input.smart_code.as_deref() {
            validation::smart_code(&format!("{path}[{index}].smart_code"), code)?;
        }

        writes.push(AttributeWrite {
            field_name: input.field_name,
            value,
            smart_code: input.smart_code,
            validation_rules: input.validation_rules,
            is_required: input.is_required.unwrap_or(false),
            is_searchable: input.is_searchable.unwrap_or(true),
            display_order: input.display_order,
        });
    }

    Ok(writes)
}

/// Parses the tenant for logging and metrics even when validation fails later.
fn tenant_hint(raw: &str) -> Option<Uuid> {
    validation::tenant_id(raw).ok()
}

//! Performance Monitor
//!
//! Measures every operation against its response-time budget, keeps a short
//! lived result cache for queries and maintains rolling per-operation
//! statistics over a bounded ring buffer.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use lru::LruCache;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::PerformanceConfig;
use crate::operations::OperationKind;

/// Timing block attached to every successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PerformanceBlock {
    pub elapsed_ms: f64,
    pub budget_ms: u64,
    pub within_budget: bool,
    /// Approximate number of store round trips
    pub store_calls: u32,
    pub cache_hit: bool,
    /// Optimization tags of the operation category
    pub optimizations: Vec<String>,
}

impl PerformanceBlock {
    /// Warning text for an overrun, `None` when within budget.
    pub fn budget_warning(&self, operation: OperationKind) -> Option<String> {
        (!self.within_budget).then(|| {
            format!(
                "{} took {:.2}ms, exceeding the {}ms budget",
                operation.name(),
                self.elapsed_ms,
                self.budget_ms
            )
        })
    }
}

/// What happened during one call, as reported to the monitor.
#[derive(Debug, Clone, Copy)]
pub struct Measurement {
    pub operation: OperationKind,
    pub tenant_id: Option<Uuid>,
    pub elapsed: Duration,
    pub store_calls: u32,
    pub cache_hit: bool,
    pub success: bool,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    elapsed_ms: f64,
    cache_hit: bool,
    within_budget: bool,
}

/// Rolling statistics for one operation category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OperationStats {
    pub operation: String,
    pub budget_ms: u64,
    /// Samples currently in the window
    pub count: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub cache_hit_rate: f64,
    pub within_budget_rate: f64,
}

/// Letter grade for the aggregate report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Grade::A
        } else if score >= 0.8 {
            Grade::B
        } else if score >= 0.7 {
            Grade::C
        } else if score >= 0.6 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

/// Aggregate performance report across all operations.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PerformanceReport {
    pub operations: Vec<OperationStats>,
    pub total_samples: usize,
    pub within_budget_rate: f64,
    pub cache_hit_rate: f64,
    pub score: f64,
    /// Absent until at least one operation has been recorded
    pub grade: Option<Grade>,
    pub cache_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: OperationKind,
    tenant_id: Uuid,
    bucket: u64,
    fingerprint: String,
}

struct CacheEntry {
    value: serde_json::Value,
    stored_at: Instant,
}

/// Budget accounting, query cache and rolling statistics.
pub struct PerformanceMonitor {
    config: PerformanceConfig,
    cache: Mutex<LruCache<CacheKey, CacheEntry>>,
    samples: Mutex<HashMap<OperationKind, VecDeque<Sample>>>,
}

impl PerformanceMonitor {
    pub fn new(config: PerformanceConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            cache: Mutex::new(LruCache::new(capacity)),
            samples: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    pub fn budget_ms(&self, operation: OperationKind) -> u64 {
        self.config.budget_ms(operation)
    }

    pub fn cache_enabled(&self) -> bool {
        self.config.cache_enabled
    }

    /// Cache key for a request: operation, tenant, TTL-sized time bucket and a
    /// fingerprint of the request body.
    pub fn cache_key(
        &self,
        operation: OperationKind,
        tenant_id: Uuid,
        fingerprint: impl Into<String>,
    ) -> CacheKey {
        let ttl = self.config.cache_ttl_seconds.max(1);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        CacheKey {
            operation,
            tenant_id,
            bucket: now / ttl,
            fingerprint: fingerprint.into(),
        }
    }

    /// Fresh cached value for `key`; expired entries are evicted on read.
    pub async fn cached(&self, key: &CacheKey) -> Option<serde_json::Value> {
        if !self.config.cache_enabled {
            return None;
        }
        let mut cache = self.cache.lock().await;
        let fresh = cache
            .get(key)
            .map(|entry| entry.stored_at.elapsed() < self.config.cache_ttl());
        match fresh {
            Some(true) => cache.get(key).map(|entry| entry.value.clone()),
            Some(false) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    pub async fn store(&self, key: CacheKey, value: serde_json::Value) {
        if !self.config.cache_enabled {
            return;
        }
        self.cache.lock().await.put(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops every cached entry for `tenant_id`; returns how many were removed.
    pub async fn invalidate_tenant(&self, tenant_id: Uuid) -> usize {
        let mut cache = self.cache.lock().await;
        let stale: Vec<CacheKey> = cache
            .iter()
            .filter(|(key, _)| key.tenant_id == tenant_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            cache.pop(key);
        }
        stale.len()
    }

    /// Records one call: updates the ring buffer, emits metrics and a log line,
    /// and returns the block for the response.
    pub async fn record(&self, measurement: Measurement) -> PerformanceBlock {
        let Measurement {
            operation,
            tenant_id,
            elapsed,
            store_calls,
            cache_hit,
            success,
        } = measurement;

        let elapsed_ms = elapsed.as_nanos() as f64 / 1_000_000.0;
        let budget_ms = self.budget_ms(operation);
        let within_budget = elapsed_ms <= budget_ms as f64;

        {
            let mut samples = self.samples.lock().await;
            let window = samples.entry(operation).or_default();
            while window.len() >= self.config.metrics_window.max(1) {
                window.pop_front();
            }
            window.push_back(Sample {
                elapsed_ms,
                cache_hit,
                within_budget,
            });
        }

        let metric_labels = vec![
            ("operation", operation.name().to_string()),
            ("outcome", if success { "success" } else { "failure" }.to_string()),
        ];
        histogram!("master_crud_operation_duration_ms", &metric_labels).record(elapsed_ms);
        counter!("master_crud_operations_total", &metric_labels).increment(1);
        if !success {
            counter!("master_crud_operation_errors_total", &metric_labels).increment(1);
        }
        if cache_hit {
            counter!("master_crud_cache_hits_total", &metric_labels).increment(1);
        }

        let tenant = tenant_id.map(|id| id.to_string()).unwrap_or_default();
        info!(
            operation = operation.name(),
            tenant_id = %tenant,
            elapsed_ms,
            budget_ms,
            store_calls,
            cache_hit,
            success,
            "Operation completed"
        );

        if !within_budget {
            counter!("master_crud_budget_exceeded_total", &metric_labels).increment(1);
            warn!(
                operation = operation.name(),
                tenant_id = %tenant,
                elapsed_ms,
                budget_ms,
                "Operation exceeded its performance budget"
            );
        }

        PerformanceBlock {
            elapsed_ms,
            budget_ms,
            within_budget,
            store_calls,
            cache_hit,
            optimizations: operation
                .optimizations()
                .iter()
                .map(|tag| tag.to_string())
                .collect(),
        }
    }

    /// Rolling statistics for one operation category.
    pub async fn stats(&self, operation: OperationKind) -> OperationStats {
        let samples = self.samples.lock().await;
        let window: Vec<Sample> = samples
            .get(&operation)
            .map(|window| window.iter().copied().collect())
            .unwrap_or_default();
        summarize(operation, self.budget_ms(operation), &window)
    }

    /// Aggregate report with a letter grade computed from
    /// `within_budget_rate * 0.7 + cache_hit_rate * 0.3`.
    pub async fn report(&self) -> PerformanceReport {
        let all: Vec<(OperationKind, Vec<Sample>)> = {
            let samples = self.samples.lock().await;
            OperationKind::ALL
                .into_iter()
                .map(|operation| {
                    let window = samples
                        .get(&operation)
                        .map(|window| window.iter().copied().collect())
                        .unwrap_or_default();
                    (operation, window)
                })
                .collect()
        };

        let operations: Vec<OperationStats> = all
            .iter()
            .map(|(operation, window)| summarize(*operation, self.budget_ms(*operation), window))
            .collect();

        let total_samples: usize = all.iter().map(|(_, window)| window.len()).sum();
        let (within_budget_rate, cache_hit_rate) = if total_samples == 0 {
            (0.0, 0.0)
        } else {
            let within = all
                .iter()
                .flat_map(|(_, window)| window.iter())
                .filter(|sample| sample.within_budget)
                .count();
            let hits = all
                .iter()
                .flat_map(|(_, window)| window.iter())
                .filter(|sample| sample.cache_hit)
                .count();
            (
                within as f64 / total_samples as f64,
                hits as f64 / total_samples as f64,
            )
        };

        let score = within_budget_rate * 0.7 + cache_hit_rate * 0.3;
        let cache_entries = self.cache.lock().await.len();

        PerformanceReport {
            operations,
            total_samples,
            within_budget_rate,
            cache_hit_rate,
            score,
            grade: (total_samples > 0).then(|| Grade::from_score(score)),
            cache_entries,
        }
    }
}

fn summarize(operation: OperationKind, budget_ms: u64, window: &[Sample]) -> OperationStats {
    let count = window.len();
    if count == 0 {
        return OperationStats {
            operation: operation.name().to_string(),
            budget_ms,
            count: 0,
            mean_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            cache_hit_rate: 0.0,
            within_budget_rate: 0.0,
        };
    }

    let mut sorted: Vec<f64> = window.iter().map(|sample| sample.elapsed_ms).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let hits = window.iter().filter(|sample| sample.cache_hit).count();
    let within = window.iter().filter(|sample| sample.within_budget).count();

    OperationStats {
        operation: operation.name().to_string(),
        budget_ms,
        count,
        mean_ms: sorted.iter().sum::<f64>() / count as f64,
        min_ms: sorted[0],
        max_ms: sorted[count - 1],
        p95_ms: percentile(&sorted, 0.95),
        p99_ms: percentile(&sorted, 0.99),
        cache_hit_rate: hits as f64 / count as f64,
        within_budget_rate: within as f64 / count as f64,
    }
}

/// Nearest-rank percentile over an ascending, non-empty slice.
fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    let rank = (quantile * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> PerformanceMonitor {
        PerformanceMonitor::new(PerformanceConfig::default())
    }

    fn measurement(operation: OperationKind, elapsed_ms: u64, cache_hit: bool) -> Measurement {
        Measurement {
            operation,
            tenant_id: None,
            elapsed: Duration::from_millis(elapsed_ms),
            store_calls: 1,
            cache_hit,
            success: true,
        }
    }

    #[test]
    fn grade_boundaries() {
        assert_eq!(Grade::from_score(0.95), Grade::A);
        assert_eq!(Grade::from_score(0.9), Grade::A);
        assert_eq!(Grade::from_score(0.85), Grade::B);
        assert_eq!(Grade::from_score(0.7), Grade::C);
        assert_eq!(Grade::from_score(0.65), Grade::D);
        assert_eq!(Grade::from_score(0.1), Grade::F);
    }

    #[test]
    fn percentile_uses_nearest_rank() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile(&sorted, 0.95), 95.0);
        assert_eq!(percentile(&sorted, 0.99), 99.0);
        assert_eq!(percentile(&[7.0], 0.99), 7.0);
    }

    #[tokio::test]
    async fn overrun_is_flagged_with_warning() {
        let monitor = monitor();
        let block = monitor
            .record(measurement(OperationKind::Create, 120, false))
            .await;

        assert!(!block.within_budget);
        assert_eq!(block.budget_ms, 80);
        assert!(block.elapsed_ms >= 120.0);
        let warning = block.budget_warning(OperationKind::Create).unwrap();
        assert!(warning.contains("create_entity_complete"));

        let block = monitor.record(measurement(OperationKind::Create, 5, false)).await;
        assert!(block.within_budget);
        assert!(block.budget_warning(OperationKind::Create).is_none());
    }

    #[tokio::test]
    async fn ring_buffer_is_bounded_by_window() {
        let monitor = monitor();
        for ms in 0..150 {
            monitor.record(measurement(OperationKind::Query, ms, false)).await;
        }

        let stats = monitor.stats(OperationKind::Query).await;
        assert_eq!(stats.count, 100);
        assert_eq!(stats.min_ms, 50.0);
        assert_eq!(stats.max_ms, 149.0);
    }

    #[tokio::test]
    async fn report_grades_from_budget_and_hit_rate() {
        let monitor = monitor();
        assert!(monitor.report().await.grade.is_none());

        for _ in 0..10 {
            monitor.record(measurement(OperationKind::Query, 1, true)).await;
        }

        let report = monitor.report().await;
        assert_eq!(report.total_samples, 10);
        assert_eq!(report.within_budget_rate, 1.0);
        assert_eq!(report.cache_hit_rate, 1.0);
        assert_eq!(report.grade, Some(Grade::A));

        for _ in 0..10 {
            monitor.record(measurement(OperationKind::Delete, 500, false)).await;
        }
        // within 0.5, hits 0.5 -> 0.35 + 0.15
        let report = monitor.report().await;
        assert!((report.score - 0.5).abs() < 1e-9);
        assert_eq!(report.grade, Some(Grade::F));
    }

    #[tokio::test]
    async fn cache_round_trip_and_tenant_invalidation() {
        let monitor = monitor();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        let key_a = monitor.cache_key(OperationKind::Query, tenant_a, "q1");
        let key_b = monitor.cache_key(OperationKind::Query, tenant_b, "q1");
        monitor.store(key_a.clone(), serde_json::json!({"a": 1})).await;
        monitor.store(key_b.clone(), serde_json::json!({"b": 1})).await;

        assert_eq!(monitor.cached(&key_a).await, Some(serde_json::json!({"a": 1})));
        let other_request = monitor.cache_key(OperationKind::Query, tenant_a, "q2");
        assert!(monitor.cached(&other_request).await.is_none());

        assert_eq!(monitor.invalidate_tenant(tenant_a).await, 1);
        assert!(monitor.cached(&key_a).await.is_none());
        assert!(monitor.cached(&key_b).await.is_some());
    }

    #[tokio::test]
    async fn disabled_cache_never_serves() {
        let monitor = PerformanceMonitor::new(PerformanceConfig {
            cache_enabled: false,
            ..PerformanceConfig::default()
        });
        let key = monitor.cache_key(OperationKind::Query, Uuid::new_v4(), "q");
        monitor.store(key.clone(), serde_json::json!(1)).await;
        assert!(monitor.cached(&key).await.is_none());
    }
}

//! Transaction Composer
//!
//! Runs an ordered list of named steps on a single store transaction. Each
//! step sees the outputs of the steps registered before it, and the first
//! failing step rolls back everything that ran before it.

use std::collections::HashSet;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CrudError;
use crate::models::{attribute, entity, relationship};

/// Value produced by one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    Entity(entity::Model),
    Attribute(attribute::Model),
    Relationship(relationship::Model),
    /// Rows touched by a bulk statement; `ids` is empty when only a count is known
    Affected { ids: Vec<Uuid>, count: u64 },
}

impl StepOutput {
    /// Identifier of the single row this step produced, if any.
    pub fn id(&self) -> Option<Uuid> {
        match self {
            StepOutput::Entity(model) => Some(model.id),
            StepOutput::Attribute(model) => Some(model.id),
            StepOutput::Relationship(model) => Some(model.id),
            StepOutput::Affected { .. } => None,
        }
    }
}

/// Outputs of the steps that already ran, in registration order.
#[derive(Debug, Default, Clone)]
pub struct StepResults {
    entries: Vec<(String, StepOutput)>,
}

impl StepResults {
    /// Output of the step registered as `name`.
    pub fn get(&self, name: &str) -> Option<&StepOutput> {
        self.entries
            .iter()
            .find(|(step, _)| step == name)
            .map(|(_, output)| output)
    }

    /// Id of the entity produced or loaded by the step `name`.
    pub fn entity_id(&self, name: &str) -> Result<Uuid, CrudError> {
        match self.get(name) {
            Some(StepOutput::Entity(model)) => Ok(model.id),
            _ => Err(CrudError::transaction(format!(
                "step '{name}' did not produce an entity"
            ))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StepOutput)> {
        self.entries
            .iter()
            .map(|(name, output)| (name.as_str(), output))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: String, output: StepOutput) {
        self.entries.push((name, output));
    }
}

/// A unit of work executed inside the composer's transaction.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(
        &self,
        txn: &DatabaseTransaction,
        prior: &StepResults,
    ) -> Result<StepOutput, CrudError>;
}

/// Ordered set of named steps executed atomically.
#[derive(Default)]
pub struct TransactionComposer {
    steps: Vec<(String, Box<dyn Step>)>,
}

impl TransactionComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `step` under `name`; steps run in registration order.
    pub fn add(&mut self, name: impl Into<String>, step: impl Step + 'static) -> &mut Self {
        self.steps.push((name.into(), Box::new(step)));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step on one transaction and commits. On the first failure
    /// the transaction is rolled back and that failure is returned unchanged.
    pub async fn execute(self, db: &DatabaseConnection) -> Result<StepResults, CrudError> {
        let mut seen = HashSet::new();
        for (name, _) in &self.steps {
            if !seen.insert(name.as_str()) {
                return Err(CrudError::transaction(format!(
                    "step '{name}' registered twice"
                )));
            }
        }

        let txn = db.begin().await?;
        let mut results = StepResults::default();

        for (name, step) in self.steps {
            match step.run(&txn, &results).await {
                Ok(output) => {
                    debug!(step = %name, "Composer step completed");
                    results.push(name, output);
                }
                Err(error) => {
                    warn!(step = %name, code = error.code(), "Composer step failed, rolling back");
                    if let Err(rollback_err) = txn.rollback().await {
                        warn!(step = %name, error = %rollback_err, "Rollback failed");
                    }
                    return Err(error);
                }
            }
        }

        txn.commit().await?;
        Ok(results)
    }
}

//! # Data Models
//!
//! SeaORM models for the three generic row kinds plus small service-level
//! response types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod attribute;
pub mod entity;
pub mod relationship;

pub use attribute::Entity as Attribute;
pub use entity::Entity as CoreEntity;
pub use relationship::Entity as Relationship;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "master-crud".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

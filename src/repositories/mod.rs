//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the three
//! row kinds. Every repository is generic over [`sea_orm::ConnectionTrait`] so
//! the same code runs on the pool or inside a composer transaction, and every
//! method takes the tenant explicitly.

pub mod attribute;
pub mod entity;
pub mod relationship;

pub use attribute::{AttributeRepository, AttributeWrite};
pub use entity::{EntityChanges, EntityFilter, EntityRepository, OrderField};
pub use relationship::{RelationshipRepository, RelationshipWrite, Side};

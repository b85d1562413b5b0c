//! # Master CRUD Library
//!
//! Atomic entity lifecycle operations (create, update, delete and query)
//! over the generic entity, attribute and relationship tables, with request
//! validation, a uniform error contract and per-operation latency budgets.

pub mod client;
pub mod composer;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod operations;
pub mod performance;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub mod validation;
pub use migration;

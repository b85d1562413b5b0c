//! Database migrations for Master CRUD.
//!
//! Creates the three generic row kinds (entities, dynamic attribute data and
//! relationships) using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_01_05_090000_create_core_entities;
mod m2026_01_05_090100_create_core_dynamic_data;
mod m2026_01_05_090200_create_core_relationships;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_01_05_090000_create_core_entities::Migration),
            Box::new(m2026_01_05_090100_create_core_dynamic_data::Migration),
            Box::new(m2026_01_05_090200_create_core_relationships::Migration),
        ]
    }
}

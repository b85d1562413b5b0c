//! Migration to create the core_entities table.
//!
//! Every business object (customer, product, appointment, ...) is stored as one
//! tenant-scoped row in this table, partitioned by `entity_type`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CoreEntities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CoreEntities::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CoreEntities::TenantId).uuid().not_null())
                    .col(ColumnDef::new(CoreEntities::EntityType).text().not_null())
                    .col(ColumnDef::new(CoreEntities::EntityName).text().not_null())
                    .col(ColumnDef::new(CoreEntities::EntityCode).text().null())
                    .col(ColumnDef::new(CoreEntities::EntityDescription).text().null())
                    .col(ColumnDef::new(CoreEntities::ParentEntityId).uuid().null())
                    .col(ColumnDef::new(CoreEntities::SmartCode).text().not_null())
                    .col(
                        ColumnDef::new(CoreEntities::Status)
                            .text()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(CoreEntities::Tags).json_binary().null())
                    .col(ColumnDef::new(CoreEntities::Metadata).json_binary().null())
                    .col(
                        ColumnDef::new(CoreEntities::BusinessRules)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CoreEntities::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CoreEntities::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(CoreEntities::CreatedBy).text().null())
                    .col(ColumnDef::new(CoreEntities::UpdatedBy).text().null())
                    .to_owned(),
            )
            .await?;

        // (id, tenant_id) is the lookup key for every scoped read
        manager
            .create_index(
                Index::create()
                    .name("idx_core_entities_id_tenant")
                    .table(CoreEntities::Table)
                    .col(CoreEntities::Id)
                    .col(CoreEntities::TenantId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_core_entities_tenant_type")
                    .table(CoreEntities::Table)
                    .col(CoreEntities::TenantId)
                    .col(CoreEntities::EntityType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_core_entities_tenant_smart_code")
                    .table(CoreEntities::Table)
                    .col(CoreEntities::TenantId)
                    .col(CoreEntities::SmartCode)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_core_entities_id_tenant").to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_core_entities_tenant_type")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_core_entities_tenant_smart_code")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(CoreEntities::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CoreEntities {
    Table,
    Id,
    TenantId,
    EntityType,
    EntityName,
    EntityCode,
    EntityDescription,
    ParentEntityId,
    SmartCode,
    Status,
    Tags,
    Metadata,
    BusinessRules,
    CreatedAt,
    UpdatedAt,
    CreatedBy,
    UpdatedBy,
}

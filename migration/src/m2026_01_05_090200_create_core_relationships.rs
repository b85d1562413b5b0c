//! Migration to create the core_relationships table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CoreRelationships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CoreRelationships::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CoreRelationships::TenantId).uuid().not_null())
                    .col(
                        ColumnDef::new(CoreRelationships::FromEntityId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CoreRelationships::ToEntityId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CoreRelationships::RelationshipType)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CoreRelationships::SmartCode).text().null())
                    .col(
                        ColumnDef::new(CoreRelationships::RelationshipDirection)
                            .text()
                            .not_null()
                            .default("forward"),
                    )
                    .col(
                        ColumnDef::new(CoreRelationships::RelationshipStrength)
                            .double()
                            .not_null()
                            .default(1.0),
                    )
                    .col(
                        ColumnDef::new(CoreRelationships::Status)
                            .text()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(CoreRelationships::EffectiveDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CoreRelationships::ExpirationDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CoreRelationships::Metadata)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CoreRelationships::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CoreRelationships::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(CoreRelationships::CreatedBy).text().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_core_relationships_tenant_from")
                    .table(CoreRelationships::Table)
                    .col(CoreRelationships::TenantId)
                    .col(CoreRelationships::FromEntityId)
                    .col(CoreRelationships::RelationshipType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_core_relationships_tenant_to")
                    .table(CoreRelationships::Table)
                    .col(CoreRelationships::TenantId)
                    .col(CoreRelationships::ToEntityId)
                    .col(CoreRelationships::RelationshipType)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_core_relationships_tenant_from")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_core_relationships_tenant_to")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(CoreRelationships::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CoreRelationships {
    Table,
    Id,
    TenantId,
    FromEntityId,
    ToEntityId,
    RelationshipType,
    SmartCode,
    RelationshipDirection,
    RelationshipStrength,
    Status,
    EffectiveDate,
    ExpirationDate,
    Metadata,
    CreatedAt,
    UpdatedAt,
    CreatedBy,
}

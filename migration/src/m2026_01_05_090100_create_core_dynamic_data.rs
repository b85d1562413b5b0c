//! Migration to create the core_dynamic_data table.
//!
//! Attribute records hold one typed value per (tenant, entity, field_name).
//! Ownership by the entity is logical only; cascades are issued per request,
//! so no foreign key is declared here.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CoreDynamicData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CoreDynamicData::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CoreDynamicData::TenantId).uuid().not_null())
                    .col(ColumnDef::new(CoreDynamicData::EntityId).uuid().not_null())
                    .col(ColumnDef::new(CoreDynamicData::FieldName).text().not_null())
                    .col(ColumnDef::new(CoreDynamicData::FieldType).text().not_null())
                    .col(ColumnDef::new(CoreDynamicData::FieldValueText).text().null())
                    .col(
                        ColumnDef::new(CoreDynamicData::FieldValueNumber)
                            .double()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CoreDynamicData::FieldValueBoolean)
                            .boolean()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CoreDynamicData::FieldValueDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CoreDynamicData::FieldValueJson)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CoreDynamicData::FieldValueFileUrl)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(CoreDynamicData::SmartCode).text().null())
                    .col(
                        ColumnDef::new(CoreDynamicData::ValidationRules)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CoreDynamicData::IsRequired)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CoreDynamicData::IsSearchable)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(CoreDynamicData::DisplayOrder).integer().null())
                    .col(
                        ColumnDef::new(CoreDynamicData::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CoreDynamicData::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Re-setting a field is an upsert, never a second row
        manager
            .create_index(
                Index::create()
                    .name("uq_core_dynamic_data_tenant_entity_field")
                    .table(CoreDynamicData::Table)
                    .col(CoreDynamicData::TenantId)
                    .col(CoreDynamicData::EntityId)
                    .col(CoreDynamicData::FieldName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("uq_core_dynamic_data_tenant_entity_field")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(CoreDynamicData::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CoreDynamicData {
    Table,
    Id,
    TenantId,
    EntityId,
    FieldName,
    FieldType,
    FieldValueText,
    FieldValueNumber,
    FieldValueBoolean,
    FieldValueDate,
    FieldValueJson,
    FieldValueFileUrl,
    SmartCode,
    ValidationRules,
    IsRequired,
    IsSearchable,
    DisplayOrder,
    CreatedAt,
    UpdatedAt,
}

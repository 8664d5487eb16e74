use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Static WMS location -> bin code lookup, maintained outside this service
        manager
            .create_table(
                Table::create()
                    .table(WarehouseLocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WarehouseLocations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WarehouseLocations::WmsLocation)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(WarehouseLocations::BinCode)
                            .string_len(50)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WarehouseLocations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum WarehouseLocations {
    Table,
    Id,
    WmsLocation,
    BinCode,
}

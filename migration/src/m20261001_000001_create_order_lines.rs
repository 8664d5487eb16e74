use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();

        manager
            .create_table(
                Table::create()
                    .table(OrderLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderLines::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrderLines::OrderNumber).string_len(50).not_null())
                    .col(
                        ColumnDef::new(OrderLines::TransactionType)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderLines::Item).string_len(50).not_null())
                    .col(quantity(backend, OrderLines::RequestedQty).not_null())
                    .col(ColumnDef::new(OrderLines::OrderLine).integer().not_null())
                    .col(
                        ColumnDef::new(OrderLines::Status)
                            .integer()
                            .not_null()
                            .default(0), // Pending
                    )
                    .col(quantity(backend, OrderLines::ActualQty).null())
                    .col(quantity(backend, OrderLines::ShortageQty).null())
                    .col(ColumnDef::new(OrderLines::PickedBy).string_len(100).null())
                    .col(ColumnDef::new(OrderLines::ApiError).text().null())
                    .col(ColumnDef::new(OrderLines::Source).string_len(255).not_null())
                    .col(ColumnDef::new(OrderLines::WmsLocation).string_len(50).null())
                    .col(ColumnDef::new(OrderLines::BinLocation).string_len(50).null())
                    .col(
                        ColumnDef::new(OrderLines::InsertedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per (order_number, order_line)
        manager
            .create_index(
                Index::create()
                    .name("idx_order_lines_order_number_line")
                    .table(OrderLines::Table)
                    .col(OrderLines::OrderNumber)
                    .col(OrderLines::OrderLine)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Every job scans by status
        manager
            .create_index(
                Index::create()
                    .name("idx_order_lines_status")
                    .table(OrderLines::Table)
                    .col(OrderLines::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderLines::Table).to_owned())
            .await
    }
}

/// Quantity column definition.
///
/// SQLite hands decimals back through `f64`, so the column needs REAL affinity
/// there; PostgreSQL keeps exact NUMERIC storage.
fn quantity(backend: DatabaseBackend, column: OrderLines) -> ColumnDef {
    let mut def = ColumnDef::new(column);
    match backend {
        DatabaseBackend::Sqlite => def.double(),
        _ => def.decimal_len(18, 4),
    };
    def
}

#[derive(Iden)]
enum OrderLines {
    Table,
    Id,
    OrderNumber,
    TransactionType,
    Item,
    RequestedQty,
    OrderLine,
    Status,
    ActualQty,
    ShortageQty,
    PickedBy,
    ApiError,
    Source,
    WmsLocation,
    BinLocation,
    InsertedAt,
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Logs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Logs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Logs::Event).string().not_null())
                    .col(ColumnDef::new(Logs::Username).string().not_null())
                    .col(ColumnDef::new(Logs::Desc).string().not_null())
                    .col(ColumnDef::new(Logs::Timestamp).string().not_null())
                    .to_owned(),
            )
            .await?;

        // Index on timestamp for the default newest-first read
        manager
            .create_index(
                Index::create()
                    .name("idx_logs_timestamp")
                    .table(Logs::Table)
                    .col(Logs::Timestamp)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Logs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Logs {
    Table,
    Id,
    Event,
    Username,
    Desc,
    Timestamp,
}

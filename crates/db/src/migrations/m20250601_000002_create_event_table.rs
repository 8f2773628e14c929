//! Create `event` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Event::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Event::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Event::OwnerId).string_len(32).not_null())
                    .col(ColumnDef::new(Event::Name).string_len(256).not_null())
                    .col(
                        ColumnDef::new(Event::Code)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Event::CoverImageKey).string_len(256))
                    .col(ColumnDef::new(Event::CoverImageUrl).text())
                    .col(
                        ColumnDef::new(Event::AutoApproval)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Event::Password).string_len(512))
                    .col(
                        ColumnDef::new(Event::ImageDisplayDuration)
                            .integer()
                            .not_null()
                            .default(5),
                    )
                    .col(
                        ColumnDef::new(Event::BackgroundTheme)
                            .string_len(32)
                            .not_null()
                            .default("dark"),
                    )
                    .col(
                        ColumnDef::new(Event::HeaderTheme)
                            .string_len(32)
                            .not_null()
                            .default("default"),
                    )
                    .col(
                        ColumnDef::new(Event::OrderingMode)
                            .string_len(16)
                            .not_null()
                            .default("insertion"),
                    )
                    .col(
                        ColumnDef::new(Event::UploadLimit)
                            .integer()
                            .not_null()
                            .default(50),
                    )
                    .col(
                        ColumnDef::new(Event::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Event::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_event_owner")
                            .from(Event::Table, Event::OwnerId)
                            .to(Organizer::Table, Organizer::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: owner_id (dashboard event list)
        manager
            .create_index(
                Index::create()
                    .name("idx_event_owner_id")
                    .table(Event::Table)
                    .col(Event::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Event::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Event {
    Table,
    Id,
    OwnerId,
    Name,
    Code,
    CoverImageKey,
    CoverImageUrl,
    AutoApproval,
    Password,
    ImageDisplayDuration,
    BackgroundTheme,
    HeaderTheme,
    OrderingMode,
    UploadLimit,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Organizer {
    Table,
    Id,
}

//! Create `challenge` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Challenge::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Challenge::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Challenge::EventId).string_len(32).not_null())
                    .col(ColumnDef::new(Challenge::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Challenge::Hashtag).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Challenge::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_challenge_event")
                            .from(Challenge::Table, Challenge::EventId)
                            .to(Event::Table, Event::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_challenge_event_id")
                    .table(Challenge::Table)
                    .col(Challenge::EventId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Challenge::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Challenge {
    Table,
    Id,
    EventId,
    Title,
    Hashtag,
    CreatedAt,
}

#[derive(Iden)]
enum Event {
    Table,
    Id,
}

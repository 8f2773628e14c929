//! Create `upload` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Upload::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Upload::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Upload::EventId).string_len(32).not_null())
                    .col(ColumnDef::new(Upload::Url).text().not_null())
                    .col(
                        ColumnDef::new(Upload::StorageKey)
                            .string_len(256)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Upload::MimeType).string_len(128).not_null())
                    .col(ColumnDef::new(Upload::UploaderName).string_len(128))
                    .col(ColumnDef::new(Upload::Caption).text())
                    .col(ColumnDef::new(Upload::ChallengeId).string_len(32))
                    .col(
                        ColumnDef::new(Upload::Approved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Upload::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // No cascade: deleting an event removes uploads explicitly first
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_upload_event")
                            .from(Upload::Table, Upload::EventId)
                            .to(Event::Table, Event::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_upload_challenge")
                            .from(Upload::Table, Upload::ChallengeId)
                            .to(Challenge::Table, Challenge::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (event_id, approved, created_at) for the live wall query
        manager
            .create_index(
                Index::create()
                    .name("idx_upload_event_approved_created")
                    .table(Upload::Table)
                    .col(Upload::EventId)
                    .col(Upload::Approved)
                    .col(Upload::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Upload::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Upload {
    Table,
    Id,
    EventId,
    Url,
    StorageKey,
    MimeType,
    UploaderName,
    Caption,
    ChallengeId,
    Approved,
    CreatedAt,
}

#[derive(Iden)]
enum Event {
    Table,
    Id,
}

#[derive(Iden)]
enum Challenge {
    Table,
    Id,
}

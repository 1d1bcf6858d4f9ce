use sea_orm_migration::prelude::*;

use super::m20240101_000002_create_tracks_table::Tracks;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Lyrics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Lyrics::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Lyrics::TrackId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Lyrics::VerseText)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Lyrics::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // Deleting a track removes its verses.
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lyrics_track_id")
                            .from(Lyrics::Table, Lyrics::TrackId)
                            .to(Tracks::Table, Tracks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_lyrics_track_id")
                    .table(Lyrics::Table)
                    .col(Lyrics::TrackId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Lyrics::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Lyrics {
    Table,
    Id,
    TrackId,
    VerseText,
    CreatedAt,
}

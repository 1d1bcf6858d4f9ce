use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_artists_table::Artists;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tracks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tracks::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Tracks::ArtistId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tracks::Title)
                            .string_len(500)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tracks::Link)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tracks::ReleasedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tracks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tracks_artist_id")
                            .from(Tracks::Table, Tracks::ArtistId)
                            .to(Artists::Table, Artists::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Backs the "track already exists" condition.
        manager
            .create_index(
                Index::create()
                    .name("idx_tracks_title_artist_id")
                    .table(Tracks::Table)
                    .col(Tracks::Title)
                    .col(Tracks::ArtistId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracks_artist_id")
                    .table(Tracks::Table)
                    .col(Tracks::ArtistId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tracks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Tracks {
    Table,
    Id,
    ArtistId,
    Title,
    Link,
    ReleasedAt,
    CreatedAt,
}

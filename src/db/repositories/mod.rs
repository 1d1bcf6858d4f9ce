use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use chrono::{TimeZone, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    TransactionError, TransactionTrait,
};

use crate::db::entities::{artist, lyric, track};
use crate::error::{AppError, Result};
use crate::models::{NewTrack, Track, TrackFilter, TrackPatch};

/// Page size used by [`TrackRepository::find_tracks_by_filter`] when no limit is given.
pub const DEFAULT_LIST_LIMIT: u64 = 10;

/// Largest LIMIT/OFFSET the SQL drivers accept (they bind as signed 64-bit).
const MAX_ROW_BOUND: u64 = i64::MAX as u64;

/// Unit of work executed by [`TrackRepository::run_in_transaction`].
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'c>>;

/// Storage gateway for artists, tracks and lyric verses.
///
/// Methods taking a `conn` argument are meant to run inside
/// [`run_in_transaction`](Self::run_in_transaction); the rest use the pool directly.
#[derive(Clone)]
pub struct TrackRepository {
    db: DatabaseConnection,
}

impl TrackRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Runs `work` in a single transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back when it returns `Err`.
    /// A transaction dropped mid-flight (panic, timeout) is rolled back as well.
    pub async fn run_in_transaction<F, T>(&self, work: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> TxFuture<'c, T> + Send,
        T: Send,
    {
        self.db
            .transaction::<_, T, AppError>(work)
            .await
            .map_err(|err| match err {
                TransactionError::Connection(e) => AppError::Database(e),
                TransactionError::Transaction(e) => e,
            })
    }

    /// Returns the id of the artist called `name`, creating the row if needed.
    ///
    /// A concurrent insert of the same name is absorbed by `ON CONFLICT DO NOTHING`.
    pub async fn find_or_create_artist<C: ConnectionTrait>(conn: &C, name: &str) -> Result<i32> {
        if let Some(existing) = find_artist_by_name(conn, name).await? {
            return Ok(existing.id);
        }

        let artist = artist::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        artist::Entity::insert(artist)
            .on_conflict(
                OnConflict::column(artist::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        let created = find_artist_by_name(conn, name).await?.ok_or_else(|| {
            AppError::Internal(format!("artist '{}' missing right after insert", name))
        })?;

        tracing::debug!(artist_id = created.id, name, "Resolved artist");
        Ok(created.id)
    }

    /// Inserts a track row and returns its id.
    pub async fn create_track<C: ConnectionTrait>(conn: &C, new_track: NewTrack) -> Result<i32> {
        let title = new_track.title.clone();
        let artist_id = new_track.artist_id;

        let model = track::ActiveModel {
            artist_id: Set(new_track.artist_id),
            title: Set(new_track.title),
            link: Set(new_track.link),
            released_at: Set(new_track.released_at.into()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        match model.insert(conn).await {
            Ok(created) => {
                tracing::debug!(track_id = created.id, artist_id, "Inserted track");
                Ok(created.id)
            }
            Err(err) if is_unique_violation(&err) => Err(AppError::AlreadyExists(format!(
                "track '{}' already exists for artist {}",
                title, artist_id
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// Inserts all verses of a track in one statement, in the given order.
    pub async fn insert_verses<C: ConnectionTrait>(
        conn: &C,
        track_id: i32,
        verses: &[String],
    ) -> Result<()> {
        if verses.is_empty() {
            return Ok(());
        }

        let now: DateTimeWithTimeZone = Utc::now().into();
        let rows = verses.iter().map(|verse| lyric::ActiveModel {
            track_id: Set(track_id),
            verse_text: Set(verse.clone()),
            created_at: Set(now),
            ..Default::default()
        });

        lyric::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;

        tracing::debug!(track_id, count = verses.len(), "Inserted verses");
        Ok(())
    }

    /// Cheap pre-flight check run before calling the music info API.
    pub async fn track_exists(&self, title: &str, artist_name: &str) -> Result<bool> {
        let count = track::Entity::find()
            .inner_join(artist::Entity)
            .filter(track::Column::Title.eq(title))
            .filter(artist::Column::Name.eq(artist_name))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// Loads a track together with all of its verses.
    pub async fn find_track(&self, id: i32) -> Result<Track> {
        self.run_in_transaction(move |txn| Box::pin(async move { Self::load_track(txn, id).await }))
            .await
    }

    async fn load_track<C: ConnectionTrait>(conn: &C, id: i32) -> Result<Track> {
        let (row, artist) = track::Entity::find_by_id(id)
            .find_also_related(artist::Entity)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("track {} not found", id)))?;

        let verses = lyric::Entity::find()
            .filter(lyric::Column::TrackId.eq(id))
            .order_by_asc(lyric::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(|verse| verse.verse_text)
            .collect();

        Ok(to_track(row, artist.map(|a| a.name).unwrap_or_default(), verses))
    }

    /// Filtered, paginated tracks keyed by id. Verses are left empty.
    ///
    /// Without a limit [`DEFAULT_LIST_LIMIT`] applies and any offset is ignored.
    /// Oversized limits and offsets are clamped to what the database accepts.
    pub async fn find_tracks_by_filter<C: ConnectionTrait>(
        conn: &C,
        filter: &TrackFilter,
    ) -> Result<BTreeMap<i32, Track>> {
        let mut query = track::Entity::find().find_also_related(artist::Entity);

        if let Some(artist_name) = &filter.artist {
            query = query.filter(artist::Column::Name.eq(artist_name.as_str()));
        }
        if let Some(title) = &filter.title {
            query = query.filter(track::Column::Title.eq(title.as_str()));
        }
        if let Some(link) = &filter.link {
            query = query.filter(track::Column::Link.eq(link.as_str()));
        }
        if let Some(year) = filter.released_year {
            let (from, to) = year_range(year)?;
            query = query
                .filter(track::Column::ReleasedAt.gte(from))
                .filter(track::Column::ReleasedAt.lt(to));
        }

        query = query.order_by_asc(track::Column::Id);

        query = match filter.limit.filter(|limit| *limit > 0) {
            Some(limit) => {
                let query = query.limit(limit.min(MAX_ROW_BOUND));
                match filter.offset.filter(|offset| *offset > 0) {
                    Some(offset) => query.offset(offset.min(MAX_ROW_BOUND)),
                    None => query,
                }
            }
            None => query.limit(DEFAULT_LIST_LIMIT),
        };

        let rows = query.all(conn).await?;

        Ok(rows
            .into_iter()
            .map(|(row, artist)| {
                let name = artist.map(|a| a.name).unwrap_or_default();
                (row.id, to_track(row, name, Vec::new()))
            })
            .collect())
    }

    /// Verses of the given tracks, ordered by verse id.
    pub async fn find_verses_by_track_ids<C: ConnectionTrait>(
        conn: &C,
        ids: &[i32],
    ) -> Result<Vec<lyric::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(lyric::Entity::find()
            .filter(lyric::Column::TrackId.is_in(ids.iter().copied()))
            .order_by_asc(lyric::Column::Id)
            .all(conn)
            .await?)
    }

    /// Renames an artist. Every track of that artist sees the new name.
    pub async fn rename_artist<C: ConnectionTrait>(
        conn: &C,
        artist_id: i32,
        name: &str,
    ) -> Result<()> {
        let result = artist::Entity::update_many()
            .col_expr(artist::Column::Name, Expr::value(name.to_string()))
            .filter(artist::Column::Id.eq(artist_id))
            .exec(conn)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AppError::AlreadyExists(format!("artist '{}' already exists", name))
                } else {
                    AppError::Database(err)
                }
            })?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("artist {} not found", artist_id)));
        }

        tracing::debug!(artist_id, name, "Renamed artist");
        Ok(())
    }

    /// Overwrites only the fields present in `patch`.
    pub async fn patch_track<C: ConnectionTrait>(
        conn: &C,
        track_id: i32,
        patch: TrackPatch,
    ) -> Result<()> {
        if patch.is_empty() {
            return Err(AppError::Validation("no track fields to update".to_string()));
        }

        let mut update = track::Entity::update_many().filter(track::Column::Id.eq(track_id));

        if let Some(title) = patch.title {
            update = update.col_expr(track::Column::Title, Expr::value(title));
        }
        if let Some(released_at) = patch.released_at {
            let released_at: DateTimeWithTimeZone = released_at.into();
            update = update.col_expr(track::Column::ReleasedAt, Expr::value(released_at));
        }
        if let Some(link) = patch.link {
            update = update.col_expr(track::Column::Link, Expr::value(link));
        }

        let result = update.exec(conn).await.map_err(|err| {
            if is_unique_violation(&err) {
                AppError::AlreadyExists(format!("track {} clashes with an existing track", track_id))
            } else {
                AppError::Database(err)
            }
        })?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("track {} not found", track_id)));
        }

        tracing::debug!(track_id, "Patched track");
        Ok(())
    }

    /// Deletes every verse of the track, then inserts `verses`.
    pub async fn replace_verses<C: ConnectionTrait>(
        conn: &C,
        track_id: i32,
        verses: &[String],
    ) -> Result<()> {
        let removed = lyric::Entity::delete_many()
            .filter(lyric::Column::TrackId.eq(track_id))
            .exec(conn)
            .await?;

        tracing::debug!(track_id, removed = removed.rows_affected, "Removed old verses");
        Self::insert_verses(conn, track_id, verses).await
    }

    /// Deletes a track; verses go with it through the foreign key cascade.
    ///
    /// Returns whether a row was removed. A missing track is not an error.
    pub async fn delete_track(&self, id: i32) -> Result<bool> {
        let result = track::Entity::delete_by_id(id).exec(&self.db).await?;
        tracing::debug!(track_id = id, rows = result.rows_affected, "Deleted track");
        Ok(result.rows_affected > 0)
    }

    /// The verse at zero-based `offset`, in insertion order.
    pub async fn find_verse_at_offset(&self, track_id: i32, offset: u64) -> Result<String> {
        if offset > MAX_ROW_BOUND {
            return Err(AppError::LyricNotFound { track_id, offset });
        }

        lyric::Entity::find()
            .filter(lyric::Column::TrackId.eq(track_id))
            .order_by_asc(lyric::Column::Id)
            .offset(offset)
            .one(&self.db)
            .await?
            .map(|verse| verse.verse_text)
            .ok_or(AppError::LyricNotFound { track_id, offset })
    }

    pub async fn artist_id_for_track<C: ConnectionTrait>(conn: &C, track_id: i32) -> Result<i32> {
        track::Entity::find_by_id(track_id)
            .one(conn)
            .await?
            .map(|row| row.artist_id)
            .ok_or_else(|| AppError::NotFound(format!("track {} not found", track_id)))
    }
}

async fn find_artist_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<Option<artist::Model>> {
    Ok(artist::Entity::find()
        .filter(artist::Column::Name.eq(name))
        .one(conn)
        .await?)
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Half-open `[Jan 1 year, Jan 1 year+1)` range in UTC.
fn year_range(year: i32) -> Result<(DateTimeWithTimeZone, DateTimeWithTimeZone)> {
    let out_of_range = || AppError::Validation(format!("release year {} is out of range", year));
    let start = |y: i32| {
        Utc.with_ymd_and_hms(y, 1, 1, 0, 0, 0)
            .single()
            .map(DateTimeWithTimeZone::from)
            .ok_or_else(out_of_range)
    };

    let next = year.checked_add(1).ok_or_else(out_of_range)?;
    Ok((start(year)?, start(next)?))
}

fn to_track(row: track::Model, artist: String, lyric: Vec<String>) -> Track {
    Track {
        id: row.id,
        artist,
        title: row.title,
        link: row.link,
        released_at: row.released_at.with_timezone(&Utc),
        lyric,
    }
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::db::TrackRepository;
use crate::error::{AppError, Result};
use crate::models::{LyricVerse, NewTrack, Track, TrackCreate, TrackFilter, TrackPatch, TrackUpdate};
use crate::services::lyrics::split_verses;
use crate::services::music_info::TrackInfoProvider;

/// Track lifecycle: creation with enrichment, reads, partial updates and deletes.
///
/// Every operation is bounded by `timeout`. When it elapses the in-flight
/// transaction is dropped, which rolls it back.
#[derive(Clone)]
pub struct TrackService {
    repo: TrackRepository,
    info: Arc<dyn TrackInfoProvider>,
    timeout: Duration,
}

impl TrackService {
    pub fn new(repo: TrackRepository, info: Arc<dyn TrackInfoProvider>, timeout: Duration) -> Self {
        Self { repo, info, timeout }
    }

    /// Creates a track from an artist/title pair and returns its id.
    ///
    /// Rejects known pairs before calling the music info API. Artist, track
    /// and verses are then written in one transaction, so a failed lookup or
    /// write leaves nothing behind.
    pub async fn create(&self, request: TrackCreate) -> Result<i32> {
        self.with_timeout("create track", self.create_track(request)).await
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Track> {
        self.with_timeout("get track", self.repo.find_track(id)).await
    }

    /// Tracks matching `filter` in ascending id order, verses included.
    pub async fn get_list(&self, filter: TrackFilter) -> Result<Vec<Track>> {
        self.with_timeout("list tracks", self.list_tracks(filter)).await
    }

    /// Applies the non-empty fields of `update` to track `id`.
    ///
    /// Renaming the artist renames the shared artist row, so every track of
    /// that artist reports the new name.
    pub async fn update(&self, id: i32, update: TrackUpdate) -> Result<()> {
        self.with_timeout("update track", self.update_track(id, update)).await
    }

    /// Deletes a track. Deleting a missing track succeeds.
    pub async fn delete(&self, id: i32) -> Result<()> {
        let removed = self.with_timeout("delete track", self.repo.delete_track(id)).await?;
        if !removed {
            tracing::debug!(track_id = id, "Delete requested for missing track");
        }
        Ok(())
    }

    pub async fn get_lyric_verse(&self, track_id: i32, offset: u64) -> Result<LyricVerse> {
        let verse = self
            .with_timeout("get lyric verse", self.repo.find_verse_at_offset(track_id, offset))
            .await?;

        Ok(LyricVerse { offset, verse })
    }

    async fn create_track(&self, request: TrackCreate) -> Result<i32> {
        let TrackCreate { title, artist } = request;

        if self.repo.track_exists(&title, &artist).await? {
            return Err(AppError::AlreadyExists(format!(
                "track '{}' by '{}' already exists",
                title, artist
            )));
        }

        let info = self.info.info(&artist, &title).await.map_err(|err| match err {
            AppError::EnrichmentFailed(_) => err,
            other => AppError::EnrichmentFailed(other.to_string()),
        })?;
        let verses = split_verses(&info.text);

        let track_id = self
            .repo
            .run_in_transaction(move |txn| {
                Box::pin(async move {
                    let artist_id = TrackRepository::find_or_create_artist(txn, &artist).await?;
                    let track_id = TrackRepository::create_track(
                        txn,
                        NewTrack {
                            artist_id,
                            title,
                            link: info.link,
                            released_at: info.release_date,
                        },
                    )
                    .await?;
                    TrackRepository::insert_verses(txn, track_id, &verses).await?;
                    Ok(track_id)
                })
            })
            .await?;

        tracing::info!(track_id, "Created track");
        Ok(track_id)
    }

    async fn list_tracks(&self, filter: TrackFilter) -> Result<Vec<Track>> {
        self.repo
            .run_in_transaction(move |txn| {
                Box::pin(async move {
                    let mut tracks = TrackRepository::find_tracks_by_filter(txn, &filter).await?;
                    let ids: Vec<i32> = tracks.keys().copied().collect();

                    for verse in TrackRepository::find_verses_by_track_ids(txn, &ids).await? {
                        if let Some(track) = tracks.get_mut(&verse.track_id) {
                            track.lyric.push(verse.verse_text);
                        }
                    }

                    Ok(tracks.into_values().collect())
                })
            })
            .await
    }

    async fn update_track(&self, id: i32, update: TrackUpdate) -> Result<()> {
        let update = update.normalized();
        if update.is_empty() {
            return Err(AppError::Validation("no fields to update".to_string()));
        }

        let TrackUpdate {
            artist,
            title,
            released_at,
            link,
            lyric,
        } = update;
        let patch = TrackPatch {
            title,
            released_at,
            link,
        };
        let verses = lyric.as_deref().map(split_verses);

        self.repo
            .run_in_transaction(move |txn| {
                Box::pin(async move {
                    // Also rejects unknown track ids before anything is written.
                    let artist_id = TrackRepository::artist_id_for_track(txn, id).await?;

                    if let Some(name) = artist {
                        TrackRepository::rename_artist(txn, artist_id, &name).await?;
                    }
                    if !patch.is_empty() {
                        TrackRepository::patch_track(txn, id, patch).await?;
                    }
                    if let Some(verses) = verses {
                        TrackRepository::replace_verses(txn, id, &verses).await?;
                    }

                    Ok(())
                })
            })
            .await?;

        tracing::info!(track_id = id, "Updated track");
        Ok(())
    }

    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.timeout, "Operation timed out");
                Err(AppError::Timeout(operation))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{count_rows, sample_info, setup_test_db, test_service, StubInfoProvider};

    #[tokio::test]
    async fn test_timeout_inside_transaction_rolls_back() {
        let db = setup_test_db().await;
        let repo = TrackRepository::new(db.clone());
        let service = TrackService::new(
            repo.clone(),
            StubInfoProvider::returning(sample_info()),
            Duration::from_millis(50),
        );

        let work = repo.run_in_transaction(|txn| {
            Box::pin(async move {
                let artist_id = TrackRepository::find_or_create_artist(txn, "Muse").await?;
                TrackRepository::create_track(
                    txn,
                    NewTrack {
                        artist_id,
                        title: "Hysteria".to_string(),
                        link: "https://example.com/hysteria".to_string(),
                        released_at: sample_info().release_date,
                    },
                )
                .await?;
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
        });

        let result = service.with_timeout("slow write", work).await;

        assert!(matches!(result, Err(AppError::Timeout("slow write"))));
        assert_eq!(count_rows(&db).await, (0, 0, 0));

        // The connection is usable again after the dropped transaction
        let service = test_service(&db, StubInfoProvider::returning(sample_info()));
        let id = service
            .create(TrackCreate {
                title: "Hysteria".to_string(),
                artist: "Muse".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(service.get_by_id(id).await.unwrap().artist, "Muse");
    }
}

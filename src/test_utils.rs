//! Test utilities for Track Catalog
//!
//! Provides helpers for creating isolated test environments with:
//! - In-memory SQLite databases (one per test)
//! - A scripted stand-in for the music info API
//! - AppState and TrackService factories
//! - Test data generators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use migration::MigratorTrait;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, PaginatorTrait, Set};

use crate::{
    config::{Config, RetryConfig},
    db::{
        entities::{artist, lyric, track},
        TrackRepository,
    },
    error::{AppError, Result},
    models::TrackInfo,
    services::{TrackInfoProvider, TrackService},
    state::AppState,
};

/// Setup an in-memory SQLite database with all migrations applied
///
/// Each call creates a fresh, isolated database perfect for parallel testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    // Run all migrations
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Create a test configuration with sensible defaults
pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 3000,
        music_info_base_url: "http://127.0.0.1:9".to_string(),
        request_timeout: Duration::from_secs(5),
        retry: RetryConfig {
            delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            max_duration: Duration::from_millis(200),
            factor: 2.0,
        },
    }
}

/// Lyric used by [`sample_info`]: three verses.
pub const SAMPLE_LYRIC: &str = "Ooh baby, don't you know I suffer?\nOoh baby, can you hear me moan?\n\nYou caught me under false pretenses\nHow long before you let me go?\n\nOoh\nYou set my soul alight  ";

/// Release date 16.07.2006, the lyric above and a fixed link
pub fn sample_info() -> TrackInfo {
    TrackInfo {
        release_date: Utc.with_ymd_and_hms(2006, 7, 16, 0, 0, 0).unwrap(),
        text: SAMPLE_LYRIC.to_string(),
        link: "https://www.youtube.com/watch?v=Xsp3_a-PMTw".to_string(),
    }
}

enum StubBehavior {
    Respond(TrackInfo),
    Fail(String),
    Stall(Duration),
}

/// Scripted [`TrackInfoProvider`] that records how often it was asked
pub struct StubInfoProvider {
    behavior: StubBehavior,
    calls: AtomicUsize,
    last_request: Mutex<Option<(String, String)>>,
}

impl StubInfoProvider {
    pub fn returning(info: TrackInfo) -> Arc<Self> {
        Arc::new(Self::with(StubBehavior::Respond(info)))
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self::with(StubBehavior::Fail(reason.to_string())))
    }

    /// Answers [`sample_info`] only after `delay`
    pub fn stalling(delay: Duration) -> Arc<Self> {
        Arc::new(Self::with(StubBehavior::Stall(delay)))
    }

    fn with(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(artist, title)` of the most recent lookup
    pub fn last_request(&self) -> Option<(String, String)> {
        self.last_request.lock().expect("stub mutex poisoned").clone()
    }
}

#[async_trait]
impl TrackInfoProvider for StubInfoProvider {
    async fn info(&self, artist: &str, title: &str) -> Result<TrackInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().expect("stub mutex poisoned") =
            Some((artist.to_string(), title.to_string()));

        match &self.behavior {
            StubBehavior::Respond(info) => Ok(info.clone()),
            StubBehavior::Fail(reason) => Err(AppError::EnrichmentFailed(reason.clone())),
            StubBehavior::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(sample_info())
            }
        }
    }
}

/// TrackService over `db` with the given provider and the test timeout
pub fn test_service(db: &DatabaseConnection, provider: Arc<dyn TrackInfoProvider>) -> TrackService {
    TrackService::new(
        TrackRepository::new(db.clone()),
        provider,
        test_config().request_timeout,
    )
}

/// Create a complete test AppState with an isolated database and a stub returning [`sample_info`]
pub async fn setup_test_app_state() -> AppState {
    setup_test_app_state_with(StubInfoProvider::returning(sample_info())).await
}

/// Create a test AppState backed by the given music info provider
pub async fn setup_test_app_state_with(provider: Arc<dyn TrackInfoProvider>) -> AppState {
    let db = setup_test_db().await;
    AppState::new(db, &test_config(), provider)
}

// ============================================================================
// Test Data Factories
// ============================================================================

/// Create a test artist in the database
pub async fn create_test_artist(db: &DatabaseConnection, name: &str) -> artist::Model {
    let artist = artist::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    };

    artist.insert(db).await.expect("Failed to insert test artist")
}

/// Create a test track released on 1 January of `year`, with one verse per entry of `verses`
pub async fn create_test_track(
    db: &DatabaseConnection,
    artist_id: i32,
    title: &str,
    year: i32,
    verses: &[&str],
) -> track::Model {
    let now = Utc::now().into();
    let track = track::ActiveModel {
        artist_id: Set(artist_id),
        title: Set(title.to_string()),
        link: Set(format!("https://example.com/{}", title.replace(' ', "-"))),
        released_at: Set(Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap().into()),
        created_at: Set(now),
        ..Default::default()
    };
    let track = track.insert(db).await.expect("Failed to insert test track");

    for verse in verses {
        let verse = lyric::ActiveModel {
            track_id: Set(track.id),
            verse_text: Set(verse.to_string()),
            created_at: Set(now),
            ..Default::default()
        };
        verse.insert(db).await.expect("Failed to insert test verse");
    }

    track
}

/// Row counts of (artists, tracks, lyrics)
pub async fn count_rows(db: &DatabaseConnection) -> (u64, u64, u64) {
    let artists = artist::Entity::find().count(db).await.expect("Failed to count artists");
    let tracks = track::Entity::find().count(db).await.expect("Failed to count tracks");
    let lyrics = lyric::Entity::find().count(db).await.expect("Failed to count lyrics");
    (artists, tracks, lyrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_test_db() {
        let db = setup_test_db().await;
        assert_eq!(count_rows(&db).await, (0, 0, 0));
    }

    #[tokio::test]
    async fn test_create_test_track() {
        let db = setup_test_db().await;
        let artist = create_test_artist(&db, "Muse").await;
        let track = create_test_track(&db, artist.id, "Supermassive Black Hole", 2006, &["V1", "V2"]).await;

        assert_eq!(track.title, "Supermassive Black Hole");
        assert_eq!(track.artist_id, artist.id);
        assert_eq!(count_rows(&db).await, (1, 1, 2));
    }

    #[tokio::test]
    async fn test_parallel_databases() {
        // Run two database setups in parallel - they should not interfere
        let (db1, db2) = tokio::join!(setup_test_db(), setup_test_db());

        let artist1 = create_test_artist(&db1, "Artist 1").await;
        let artist2 = create_test_artist(&db2, "Artist 2").await;

        // Both should be ID 1 (separate databases)
        assert_eq!(artist1.id, 1);
        assert_eq!(artist2.id, 1);
    }

    #[tokio::test]
    async fn test_stub_records_requests() {
        let stub = StubInfoProvider::failing("upstream down");
        let result = stub.info("Muse", "Starlight").await;

        assert!(matches!(result, Err(AppError::EnrichmentFailed(_))));
        assert_eq!(stub.calls(), 1);
        assert_eq!(stub.last_request(), Some(("Muse".to_string(), "Starlight".to_string())));
    }
}

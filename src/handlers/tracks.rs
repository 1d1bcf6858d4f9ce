use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    models::{LyricVerse, Track, TrackCreate, TrackFilter, TrackUpdate},
    services::music_info::parse_release_date,
    state::AppState,
};

#[derive(Deserialize)]
pub struct CreateTrackRequest {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub song: String,
}

#[derive(Serialize, Deserialize)]
pub struct CreateTrackResponse {
    pub id: i32,
}

#[derive(Deserialize, Default)]
pub struct ListTracksQuery {
    pub artist: Option<String>,
    pub track: Option<String>,
    pub link: Option<String>,
    pub releasedyear: Option<i32>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Deserialize, Default)]
pub struct UpdateTrackRequest {
    pub artist: Option<String>,
    pub track: Option<String>,
    /// `DD.MM.YYYY`
    pub released: Option<String>,
    pub link: Option<String>,
    pub lyric: Option<String>,
}

#[derive(Deserialize)]
pub struct LyricQuery {
    #[serde(default)]
    pub offset: u64,
}

#[derive(Serialize, Deserialize)]
pub struct TrackResponse {
    pub id: i32,
    pub artist: String,
    pub track: String,
    pub lyric: Vec<String>,
    pub link: String,
    pub released: DateTime<Utc>,
}

impl From<Track> for TrackResponse {
    fn from(track: Track) -> Self {
        Self {
            id: track.id,
            artist: track.artist,
            track: track.title,
            lyric: track.lyric,
            link: track.link,
            released: track.released_at,
        }
    }
}

/// Create a track, enriched from the music info API
pub async fn create_track(
    State(state): State<AppState>,
    Json(payload): Json<CreateTrackRequest>,
) -> Result<impl IntoResponse> {
    let group = payload.group.trim();
    let song = payload.song.trim();

    if group.is_empty() || song.is_empty() {
        return Err(AppError::Validation(
            "both 'group' and 'song' are required".to_string(),
        ));
    }

    let id = state
        .tracks
        .create(TrackCreate {
            title: song.to_string(),
            artist: group.to_string(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CreateTrackResponse { id })))
}

/// List tracks with optional exact-match filters
pub async fn list_tracks(
    State(state): State<AppState>,
    Query(query): Query<ListTracksQuery>,
) -> Result<Json<Vec<TrackResponse>>> {
    let filter = TrackFilter {
        artist: non_blank(query.artist),
        title: non_blank(query.track),
        link: non_blank(query.link),
        released_year: query.releasedyear,
        limit: query.limit,
        offset: query.offset,
    };

    let tracks = state.tracks.get_list(filter).await?;

    Ok(Json(tracks.into_iter().map(TrackResponse::from).collect()))
}

pub async fn get_track(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<TrackResponse>> {
    let track = state.tracks.get_by_id(id).await?;
    Ok(Json(track.into()))
}

/// Partially update a track; absent or empty fields are left untouched
pub async fn update_track(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateTrackRequest>,
) -> Result<StatusCode> {
    let released_at = match non_blank(payload.released) {
        Some(raw) => Some(parse_release_date(&raw).ok_or_else(|| {
            AppError::Validation(format!("'released' must look like 16.07.2006, got '{}'", raw))
        })?),
        None => None,
    };

    let link = non_blank(payload.link);
    if let Some(link) = &link {
        Url::parse(link)
            .map_err(|_| AppError::Validation(format!("'link' is not a valid URL: '{}'", link)))?;
    }

    let update = TrackUpdate {
        artist: non_blank(payload.artist),
        title: non_blank(payload.track),
        released_at,
        link,
        lyric: non_blank(payload.lyric),
    };

    state.tracks.update(id, update).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete a track; deleting a missing track still answers 204
pub async fn delete_track(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    state.tracks.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch one verse of a track's lyric by zero-based offset
pub async fn get_lyric_verse(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<LyricQuery>,
) -> Result<Json<LyricVerse>> {
    let verse = state.tracks.get_lyric_verse(id, query.offset).await?;
    Ok(Json(verse))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

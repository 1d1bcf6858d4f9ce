//! Value objects passed between the handlers, the track service and the
//! repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A track with its artist name and lyric verses in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: i32,
    pub artist: String,
    pub title: String,
    pub link: String,
    pub released_at: DateTime<Utc>,
    pub lyric: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackCreate {
    pub title: String,
    pub artist: String,
}

/// Partial update. `None` and empty strings leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackUpdate {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub released_at: Option<DateTime<Utc>>,
    pub link: Option<String>,
    pub lyric: Option<String>,
}

impl TrackUpdate {
    /// Drops empty strings so that only real values remain.
    pub fn normalized(self) -> Self {
        Self {
            artist: non_empty(self.artist),
            title: non_empty(self.title),
            released_at: self.released_at,
            link: non_empty(self.link),
            lyric: non_empty(self.lyric),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.artist.is_none()
            && self.title.is_none()
            && self.released_at.is_none()
            && self.link.is_none()
            && self.lyric.is_none()
    }
}

/// Fields of the `tracks` row itself that an update may overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackPatch {
    pub title: Option<String>,
    pub released_at: Option<DateTime<Utc>>,
    pub link: Option<String>,
}

impl TrackPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.released_at.is_none() && self.link.is_none()
    }
}

/// Exact-match filters for listing tracks, all combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackFilter {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub released_year: Option<i32>,
    pub limit: Option<u64>,
    /// Only honoured together with `limit`.
    pub offset: Option<u64>,
}

/// Row data for a track about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrack {
    pub artist_id: i32,
    pub title: String,
    pub link: String,
    pub released_at: DateTime<Utc>,
}

/// Result of a music info lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub release_date: DateTime<Utc>,
    pub text: String,
    pub link: String,
}

/// A single verse addressed by its zero-based position in the lyric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricVerse {
    pub offset: u64,
    pub verse: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

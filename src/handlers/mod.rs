pub mod health;
pub mod tracks;

use axum::{routing::get, Router};

use crate::state::AppState;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Track endpoints
        .route(
            "/v1/tracks",
            get(tracks::list_tracks).post(tracks::create_track),
        )
        .route(
            "/v1/tracks/:id",
            get(tracks::get_track)
                .patch(tracks::update_track)
                .delete(tracks::delete_track),
        )
        .route("/v1/tracks/:id/lyric", get(tracks::get_lyric_verse))
}

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::db::TrackRepository;
use crate::services::{TrackInfoProvider, TrackService};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub tracks: TrackService,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        config: &Config,
        info_provider: Arc<dyn TrackInfoProvider>,
    ) -> Self {
        let tracks = TrackService::new(
            TrackRepository::new(db.clone()),
            info_provider,
            config.request_timeout,
        );

        Self { db, tracks }
    }
}

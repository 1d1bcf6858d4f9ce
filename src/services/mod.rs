pub mod lyrics;
pub mod music_info;
pub mod tracks;

pub use lyrics::split_verses;
pub use music_info::{MusicInfoService, TrackInfoProvider};
pub use tracks::TrackService;

pub mod artist;
pub mod lyric;
pub mod track;

pub use artist::Entity as Artist;
pub use lyric::Entity as Lyric;
pub use track::Entity as Track;

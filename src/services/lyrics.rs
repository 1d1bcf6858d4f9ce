/// Splits raw lyric text into verses on blank lines (`"\n\n"`).
///
/// Each verse is trimmed and empty segments are dropped. Single newlines
/// inside a verse are kept.
pub fn split_verses(lyrics: &str) -> Vec<String> {
    lyrics
        .split("\n\n")
        .map(str::trim)
        .filter(|verse| !verse.is_empty())
        .map(str::to_string)
        .collect()
}

//! YouTube link builders. No network access; these only format URLs.

/// Video opened by the "open youtube video" command.
pub const FIXED_VIDEO_ID: &str = "dQw4w9WgXcQ";

const SEARCH_URL: &str = "https://www.youtube.com/results?search_query=";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Search-results URL with the query percent-encoded.
pub fn search_url(query: &str) -> String {
    format!("{}{}", SEARCH_URL, urlencoding::encode(query))
}

/// Watch URL for a single video.
pub fn video_url(video_id: &str) -> String {
    format!("{}{}", WATCH_URL, video_id)
}

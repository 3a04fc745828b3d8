//! Command Classification
//!
//! Maps a transcript onto one of the scripted skills or onto the chat fallback.
//! The priority order lives in [`ROUTES`] and is evaluated top to bottom; the
//! first prefix that matches wins.

/// The handling path chosen for a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Build a YouTube search-results link for the query.
    YoutubeSearch { query: String },
    /// Open the fixed YouTube video.
    YoutubeVideo,
    /// Run a web search for the query.
    WebSearch { query: String },
    /// Look up a product in the knowledge catalog by name.
    ProductInfo { name: String },
    /// No scripted command matched; hand the utterance to the chat model.
    Chat,
}

/// A prefix and the command it produces from the remainder of the transcript.
pub struct Route {
    pub prefix: &'static str,
    pub build: fn(String) -> Command,
}

/// Scripted commands in priority order.
pub const ROUTES: &[Route] = &[
    Route {
        prefix: "search youtube for",
        build: |query| Command::YoutubeSearch { query },
    },
    Route {
        prefix: "open youtube video",
        build: |_| Command::YoutubeVideo,
    },
    Route {
        prefix: "search stock for",
        build: |query| Command::WebSearch { query },
    },
    Route {
        prefix: "tell me about",
        build: |name| Command::ProductInfo { name },
    },
];

/// Classifies a transcript against [`ROUTES`].
///
/// Matching is case-insensitive and only looks at the start of the transcript.
/// The extracted argument is whatever follows the prefix, trimmed.
pub fn classify(transcript: &str) -> Command {
    ROUTES
        .iter()
        .find_map(|route| {
            strip_prefix_ignore_case(transcript, route.prefix)
                .map(|rest| (route.build)(rest.trim().to_string()))
        })
        .unwrap_or(Command::Chat)
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

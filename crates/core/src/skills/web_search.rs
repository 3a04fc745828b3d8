//! Web search backed by the Google Custom Search JSON API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchItem {
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    pub link: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("web search is not configured")]
    NotConfigured,
    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("search service responded with {0}")]
    Rejected(reqwest::StatusCode),
}

/// A service that returns web results for a free-text query.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchItem>, SearchError>;
}

/// Credentials for a Programmable Search Engine.
#[derive(Debug)]
pub struct GoogleCseCredentials {
    pub api_key: SecretString,
    pub engine_id: String,
}

#[derive(Deserialize)]
struct CseResponse {
    // Absent when the query has no results.
    #[serde(default)]
    items: Vec<SearchItem>,
}

pub struct GoogleCustomSearch {
    client: reqwest::Client,
    endpoint: String,
    credentials: Option<GoogleCseCredentials>,
}

impl GoogleCustomSearch {
    pub const DEFAULT_ENDPOINT: &'static str = "https://www.googleapis.com/customsearch/v1";

    /// Without credentials every search fails with [`SearchError::NotConfigured`].
    pub fn new(client: reqwest::Client, credentials: Option<GoogleCseCredentials>) -> Self {
        Self {
            client,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            credentials,
        }
    }
}

#[async_trait]
impl WebSearch for GoogleCustomSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchItem>, SearchError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(SearchError::NotConfigured)?;

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("key", credentials.api_key.expose_secret()),
                ("cx", credentials.engine_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Rejected(status));
        }

        let body: CseResponse = response.json().await?;
        Ok(body.items)
    }
}

/// Formats each hit as `title\nsnippet\nlink`, separated by a blank line.
pub fn format_results(items: &[SearchItem]) -> String {
    items
        .iter()
        .map(|item| format!("{}\n{}\n{}", item.title, item.snippet, item.link))
        .collect::<Vec<_>>()
        .join("\n\n")
}

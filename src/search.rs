//! YouTube Data API v3 search.
//!
//! Used by command layers to turn free text into watch links that the
//! resolver can then turn into audio. The resolver itself never calls it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::ConfigError;
use crate::resolver::platform::watch_url;
use crate::resolver::utils::body_excerpt;

const YOUTUBE_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RESULTS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("Search API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// One search hit, shaped for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    pub video_id: String,
    pub title: String,
    pub link: String,
    pub thumbnail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    items: Vec<ApiItem>,
}

#[derive(Debug, Deserialize)]
struct ApiItem {
    id: ApiId,
    snippet: ApiSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiSnippet {
    title: String,
    #[serde(default)]
    thumbnails: ApiThumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct ApiThumbnails {
    high: Option<ApiThumbnail>,
    default: Option<ApiThumbnail>,
}

#[derive(Debug, Deserialize)]
struct ApiThumbnail {
    url: String,
}

/// Search client bound to one API key.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SearchClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: YOUTUBE_API_BASE_URL.to_string(),
        }
    }

    /// Build from `YOUTUBE_API_KEY`; a missing key is a startup error.
    pub fn from_env(client: reqwest::Client) -> Result<Self, ConfigError> {
        let key = std::env::var("YOUTUBE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingKey("YOUTUBE_API_KEY"))?;
        Ok(Self::new(client, key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn search(&self, query: &str) -> Result<SearchResults, SearchError> {
        let url = format!("{}/search", self.base_url);
        debug!(query = %query, "Querying YouTube search API");

        let max_results = MAX_RESULTS.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("q", query),
                ("key", self.api_key.as_str()),
            ])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| SearchError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::ApiError(
                status.as_u16(),
                body_excerpt(response).await,
            ));
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        let items = parsed
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                let thumbnail = item
                    .snippet
                    .thumbnails
                    .high
                    .or(item.snippet.thumbnails.default)
                    .map(|t| t.url)
                    .unwrap_or_default();
                Some(SearchItem {
                    link: watch_url(&video_id),
                    video_id,
                    title: item.snippet.title,
                    thumbnail,
                })
            })
            .collect();

        Ok(SearchResults { items })
    }
}

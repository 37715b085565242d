// Metadata API indirection - looks up audio streams for a video id and picks the best one

use async_trait::async_trait;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info};

use crate::resolver::errors::{ResolutionError, MAX_EXCERPT_CHARS};
use crate::resolver::models::{AudioStream, Reference, RemoteSource, StreamsResponse, StrategyOutcome};
use crate::resolver::traits::ResolutionStrategy;
use crate::resolver::utils::{body_excerpt, excerpt};

const BACKEND: &str = "metadata";

/// Queries `GET {base}/streams/{id}` and yields the highest-bitrate audio stream.
pub struct MetadataApiStrategy {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl MetadataApiStrategy {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn streams_url(&self, video_id: &str) -> String {
        format!("{}/streams/{}", self.base_url, video_id)
    }

    async fn fetch_streams(&self, video_id: &str) -> Result<Vec<AudioStream>, ResolutionError> {
        let url = self.streams_url(video_id);
        debug!("[metadata] GET {}", url);

        let request = async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| transport_error(&e, self.timeout))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ResolutionError::backend_unavailable(
                    BACKEND,
                    Some(status.as_u16()),
                    &body_excerpt(response).await,
                ));
            }

            let body = response
                .text()
                .await
                .map_err(|e| transport_error(&e, self.timeout))?;

            let parsed: StreamsResponse = serde_json::from_str(&body).map_err(|e| {
                ResolutionError::backend_unavailable(
                    BACKEND,
                    Some(status.as_u16()),
                    &format!("invalid JSON ({}): {}", e, excerpt(&body, MAX_EXCERPT_CHARS)),
                )
            })?;
            Ok(parsed.audio_streams)
        };

        match timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ResolutionError::Timeout {
                step: "metadata query",
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

/// Highest bitrate stream with a usable URL.
pub fn select_best_stream(streams: &[AudioStream]) -> Option<&AudioStream> {
    streams
        .iter()
        .filter(|s| !s.url.is_empty())
        .max_by_key(|s| s.bitrate)
}

fn transport_error(e: &reqwest::Error, limit: Duration) -> ResolutionError {
    if e.is_timeout() {
        ResolutionError::Timeout {
            step: "metadata query",
            seconds: limit.as_secs(),
        }
    } else {
        ResolutionError::backend_unavailable(BACKEND, None, &e.to_string())
    }
}

#[async_trait]
impl ResolutionStrategy for MetadataApiStrategy {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn attempt(&self, reference: &Reference) -> Result<StrategyOutcome, ResolutionError> {
        let video_id = reference.video_id().ok_or_else(|| {
            ResolutionError::UnsupportedReference(reference.as_str().to_string())
        })?;

        let streams = self.fetch_streams(video_id).await?;
        let best = select_best_stream(&streams)
            .ok_or_else(|| ResolutionError::NoAudioAvailable(video_id.to_string()))?;

        info!(
            "[metadata] {} -> {} kbps stream of {}",
            video_id,
            best.bitrate / 1000,
            streams.len()
        );
        Ok(StrategyOutcome::RemoteSource(RemoteSource {
            url: best.url.clone(),
            extension: best.extension().to_string(),
            backend: BACKEND,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(bitrate: u64, url: &str) -> AudioStream {
        AudioStream {
            url: url.to_string(),
            bitrate,
            mime_type: None,
        }
    }

    #[test]
    fn picks_highest_bitrate() {
        let streams = vec![stream(64, "A"), stream(256, "B"), stream(128, "C")];
        assert_eq!(select_best_stream(&streams).map(|s| s.url.as_str()), Some("B"));
    }

    #[test]
    fn skips_streams_without_url() {
        let streams = vec![stream(64, "A"), stream(320, "")];
        assert_eq!(select_best_stream(&streams).map(|s| s.url.as_str()), Some("A"));
        assert!(select_best_stream(&[]).is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let strategy = MetadataApiStrategy::new(
            reqwest::Client::new(),
            "https://pipedapi.example/",
            Duration::from_secs(5),
        );
        assert_eq!(strategy.streams_url("abc"), "https://pipedapi.example/streams/abc");
    }

    #[tokio::test]
    async fn unsupported_reference_makes_no_request() {
        // Port 9 (discard) would fail loudly if a request were attempted.
        let strategy = MetadataApiStrategy::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            Duration::from_secs(5),
        );
        let err = strategy
            .attempt(&Reference::parse("https://vimeo.com/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::UnsupportedReference(_)));
    }
}

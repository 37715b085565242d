use async_trait::async_trait;
use reqwest::Url;

use crate::resolver::errors::ResolutionError;
use crate::resolver::models::{Reference, RemoteSource, StrategyOutcome};
use crate::resolver::traits::ResolutionStrategy;

/// Forwards the reference to a proxy whose response body is the audio itself.
///
/// No network I/O happens here; the orchestrator streams the returned source.
pub struct ProxyStrategy {
    base_url: Url,
}

impl ProxyStrategy {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    /// `{base}?url={reference}`
    pub fn request_url(&self, reference: &Reference) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("url", reference.as_str());
        url
    }
}

#[async_trait]
impl ResolutionStrategy for ProxyStrategy {
    fn name(&self) -> &'static str {
        "proxy"
    }

    async fn attempt(&self, reference: &Reference) -> Result<StrategyOutcome, ResolutionError> {
        if reference.video_id().is_none() {
            return Err(ResolutionError::UnsupportedReference(
                reference.as_str().to_string(),
            ));
        }
        Ok(StrategyOutcome::RemoteSource(RemoteSource {
            url: self.request_url(reference).to_string(),
            extension: "mp3".to_string(),
            backend: self.name(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_is_forwarded_as_query_param() {
        let strategy = ProxyStrategy::new(Url::parse("http://proxy.local/download").unwrap());
        let url = strategy.request_url(&Reference::parse("https://www.youtube.com/watch?v=abc&t=1"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(url.path(), "/download");
        assert_eq!(
            pairs,
            vec![(
                "url".to_string(),
                "https://www.youtube.com/watch?v=abc&t=1".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn yields_remote_source() {
        let strategy = ProxyStrategy::new(Url::parse("http://proxy.local/download").unwrap());
        let outcome = strategy
            .attempt(&Reference::parse("https://youtu.be/abc"))
            .await
            .unwrap();
        match outcome {
            StrategyOutcome::RemoteSource(source) => {
                assert_eq!(source.backend, "proxy");
                assert_eq!(source.extension, "mp3");
                assert!(source.url.starts_with("http://proxy.local/download?url="));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

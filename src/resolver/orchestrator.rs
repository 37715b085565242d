// Orchestrator with cache, in-flight de-duplication and fallback logic

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::Url;
use tracing::{debug, error, info, warn};

use super::allocator::{ArtifactAllocator, ArtifactNaming};
use super::cache::ResolutionCache;
use super::errors::{ResolutionError, ResolveError};
use super::fetcher::StreamingFetcher;
use super::models::{Reference, RemoteSource, StrategyOutcome};
use super::platform::{self, CacheKeying};
use super::strategies::{
    ExtractionStrategy, LocalFileStrategy, MetadataApiStrategy, ProxyStrategy, YtDlpExtractor,
};
use super::traits::ResolutionStrategy;
use super::utils::build_http_client;
use crate::config::{ConfigError, ResolverConfig, StrategyKind};

type SharedResolution = Shared<BoxFuture<'static, Result<PathBuf, ResolutionError>>>;

/// Public entry point: turns references into local audio files.
///
/// Cloning is cheap and clones share the cache and the in-flight table.
#[derive(Clone)]
pub struct AudioResolver {
    local: LocalFileStrategy,
    strategies: Arc<Vec<Arc<dyn ResolutionStrategy>>>,
    cache: Arc<ResolutionCache>,
    allocator: ArtifactAllocator,
    fetcher: StreamingFetcher,
    fetch_timeout: Duration,
    keying: CacheKeying,
    inflight: Arc<Mutex<HashMap<String, SharedResolution>>>,
}

impl AudioResolver {
    pub fn new(
        cache: Arc<ResolutionCache>,
        allocator: ArtifactAllocator,
        fetcher: StreamingFetcher,
    ) -> Self {
        Self {
            local: LocalFileStrategy::new(),
            strategies: Arc::new(Vec::new()),
            cache,
            allocator,
            fetcher,
            fetch_timeout: Duration::from_secs(180),
            keying: CacheKeying::default(),
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Assemble the production stack described by `config`.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = build_http_client(config.network_proxy.as_deref())
            .map_err(|e| ConfigError::invalid("network_proxy", e.to_string()))?;
        let allocator = ArtifactAllocator::new(config.artifact_dir.clone(), config.naming);
        let fetcher = StreamingFetcher::new(client.clone()).with_chunk_size(config.chunk_size);

        let mut resolver = Self::new(Arc::new(ResolutionCache::new()), allocator.clone(), fetcher)
            .with_fetch_timeout(config.fetch_timeout)
            .with_cache_keying(config.cache_keying);

        for kind in &config.strategies {
            let strategy: Arc<dyn ResolutionStrategy> = match kind {
                StrategyKind::Extraction => {
                    let extractor = YtDlpExtractor::new(config.extraction_timeout)
                        .with_path(config.ytdlp_path.clone())
                        .with_proxy(config.network_proxy.clone());
                    Arc::new(
                        ExtractionStrategy::new(
                            Arc::new(extractor),
                            allocator.clone(),
                            config.max_concurrent_extractions,
                        )
                        .with_format(config.audio_codec.clone(), config.audio_quality.clone()),
                    )
                }
                StrategyKind::Proxy => {
                    let raw = config
                        .proxy_base_url
                        .as_deref()
                        .ok_or(ConfigError::MissingKey("RESOLVER_PROXY_URL"))?;
                    let url = Url::parse(raw)
                        .map_err(|e| ConfigError::invalid("RESOLVER_PROXY_URL", e.to_string()))?;
                    Arc::new(ProxyStrategy::new(url))
                }
                StrategyKind::Metadata => {
                    let base = config
                        .metadata_base_url
                        .as_deref()
                        .ok_or(ConfigError::MissingKey("RESOLVER_METADATA_URL"))?;
                    Arc::new(MetadataApiStrategy::new(
                        client.clone(),
                        base,
                        config.metadata_timeout,
                    ))
                }
            };
            resolver.add_strategy(strategy);
        }

        info!(
            "[Resolver] strategies: {}",
            resolver.strategy_names().join(" -> ")
        );
        Ok(resolver)
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn ResolutionStrategy>) -> Self {
        self.add_strategy(strategy);
        self
    }

    /// Append a strategy at the lowest priority.
    pub fn add_strategy(&mut self, strategy: Arc<dyn ResolutionStrategy>) {
        Arc::make_mut(&mut self.strategies).push(strategy);
    }

    pub fn with_fetch_timeout(mut self, limit: Duration) -> Self {
        self.fetch_timeout = limit;
        self
    }

    pub fn with_cache_keying(mut self, keying: CacheKeying) -> Self {
        self.keying = keying;
        self
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolve `reference` to a playable local file.
    ///
    /// Local files are returned as-is and never cached. Concurrent calls for
    /// the same cache key share a single underlying resolution, which keeps
    /// running even if every caller stops waiting for it.
    pub async fn resolve(&self, reference: &str) -> Result<PathBuf, ResolveError> {
        let reference = Reference::parse(reference);

        if let Ok(StrategyOutcome::ResolvedFile(path)) = self.local.attempt(&reference).await {
            debug!("[Resolver] {} is a local file", reference);
            return Ok(path);
        }

        if reference.video_id().is_none() {
            return Err(ResolveError::new(
                reference.as_str(),
                ResolutionError::UnsupportedReference(
                    "not a valid YouTube link".to_string(),
                ),
            ));
        }

        let key = platform::cache_key(reference.as_str(), reference.video_id(), self.keying);
        if let Some(path) = self.cache.get(&key) {
            info!("[Resolver] cache hit for {}", key);
            return Ok(path);
        }

        // Content-hash artifacts are shared by every key of one video, so
        // resolutions writing the same file must share one flight.
        let flight = match self.allocator.naming() {
            ArtifactNaming::ContentHash => platform::artifact_key(&reference),
            ArtifactNaming::Unique => key.clone(),
        };

        let pending = {
            let mut inflight = self.inflight.lock();
            if let Some(path) = self.cache.get(&key) {
                return Ok(path);
            }
            match inflight.get(&flight) {
                Some(pending) => {
                    debug!("[Resolver] joining in-flight resolution for {}", flight);
                    pending.clone()
                }
                None => {
                    let pending =
                        self.spawn_resolution(reference.clone(), key.clone(), flight.clone());
                    inflight.insert(flight, pending.clone());
                    pending
                }
            }
        };

        match pending.await {
            Ok(path) => {
                self.cache.put(key, path.clone());
                Ok(path)
            }
            Err(kind) => Err(ResolveError::new(reference.as_str(), kind)),
        }
    }

    /// Run one resolution on its own task.
    ///
    /// The task owns the work: it runs to completion (or its own timeout)
    /// and cleans up even when every waiter has gone away. Waiters share the
    /// join handle.
    fn spawn_resolution(
        &self,
        reference: Reference,
        key: String,
        flight: String,
    ) -> SharedResolution {
        let this = self.clone();
        let task_flight = flight.clone();
        let handle = tokio::spawn(async move {
            let result = this.resolve_uncached(&reference).await;
            if let Ok(path) = &result {
                this.cache.put(key, path.clone());
            }
            this.inflight.lock().remove(&task_flight);
            result
        });

        let inflight = Arc::clone(&self.inflight);
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    // The task panicked before it could deregister itself.
                    inflight.lock().remove(&flight);
                    Err(ResolutionError::Io(format!("resolution task failed: {}", e)))
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn resolve_uncached(&self, reference: &Reference) -> Result<PathBuf, ResolutionError> {
        if let Some(path) = self.allocator.find_existing(&platform::artifact_key(reference)) {
            info!("[Resolver] reusing artifact {} for {}", path.display(), reference);
            return Ok(path);
        }

        let mut last_error = None;
        for strategy in self.strategies.iter() {
            info!("[Resolver] Trying strategy: {} for {}", strategy.name(), reference);

            let result = match strategy.attempt(reference).await {
                Ok(StrategyOutcome::ResolvedFile(path)) => Ok(path),
                Ok(StrategyOutcome::RemoteSource(source)) => self.download(reference, &source).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(path) => {
                    info!("[Resolver] ✓ Success with {}: {}", strategy.name(), path.display());
                    return Ok(path);
                }
                Err(e) => {
                    warn!("[Resolver] ✗ {} failed: {}", strategy.name(), e);
                    last_error = Some(e);
                }
            }
        }

        let err = last_error.unwrap_or_else(|| {
            ResolutionError::backend_unavailable("resolver", None, "no resolution strategies configured")
        });
        error!("[Resolver] All strategies failed for {}: {}", reference, err);
        Err(err)
    }

    async fn download(
        &self,
        reference: &Reference,
        source: &RemoteSource,
    ) -> Result<PathBuf, ResolutionError> {
        let dest = self.allocator.allocate(
            &platform::artifact_key(reference),
            &format!(".{}", source.extension),
        )?;
        debug!("[Resolver] streaming {} into {}", source.backend, dest.display());

        match self.fetcher.fetch(&source.url, &dest, self.fetch_timeout).await {
            Ok(_) => Ok(dest),
            Err(e) => {
                // Only a reserved unique name is ours to delete; a content-hash
                // path may already hold another writer's finished artifact.
                if self.allocator.naming() == ArtifactNaming::Unique {
                    if let Err(rm) = tokio::fs::remove_file(&dest).await {
                        if rm.kind() != std::io::ErrorKind::NotFound {
                            warn!("could not remove {}: {}", dest.display(), rm);
                        }
                    }
                }
                Err(e.into_resolution(source.backend))
            }
        }
    }
}

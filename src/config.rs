// Resolver configuration

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::resolver::allocator::ArtifactNaming;
use crate::resolver::fetcher::DEFAULT_CHUNK_SIZE;
use crate::resolver::platform::CacheKeying;

/// Startup-time configuration problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingKey(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Unknown strategy: {0} (expected extraction, proxy or metadata)")]
    UnknownStrategy(String),

    #[error("No resolution strategies configured")]
    NoStrategies,
}

impl ConfigError {
    pub fn invalid(key: &'static str, value: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.into(),
        }
    }
}

/// Backend kinds the resolver can be assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Local yt-dlp download + transcode
    Extraction,
    /// HTTP proxy that returns audio bytes
    Proxy,
    /// Streaming-metadata API lookup
    Metadata,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extraction => write!(f, "extraction"),
            Self::Proxy => write!(f, "proxy"),
            Self::Metadata => write!(f, "metadata"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "extraction" | "ytdlp" | "yt-dlp" => Ok(Self::Extraction),
            "proxy" => Ok(Self::Proxy),
            "metadata" | "piped" => Ok(Self::Metadata),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Parse a comma separated priority list such as `"proxy,metadata"`.
pub fn parse_strategy_list(raw: &str) -> Result<Vec<StrategyKind>, ConfigError> {
    let kinds = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(StrategyKind::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    if kinds.is_empty() {
        return Err(ConfigError::NoStrategies);
    }
    Ok(kinds)
}

/// Configuration for assembling an [`AudioResolver`](crate::AudioResolver)
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Strategies in priority order
    pub strategies: Vec<StrategyKind>,
    /// Proxy endpoint receiving `?url=<reference>`
    pub proxy_base_url: Option<String>,
    /// Metadata API root serving `/streams/{id}`
    pub metadata_base_url: Option<String>,
    /// Directory receiving downloaded artifacts
    pub artifact_dir: PathBuf,
    pub naming: ArtifactNaming,
    pub cache_keying: CacheKeying,
    pub metadata_timeout: Duration,
    pub fetch_timeout: Duration,
    pub extraction_timeout: Duration,
    pub chunk_size: usize,
    pub max_concurrent_extractions: usize,
    pub audio_codec: String,
    pub audio_quality: String,
    /// Explicit yt-dlp binary; searched on PATH otherwise
    pub ytdlp_path: Option<String>,
    /// HTTP/SOCKS5 proxy for outgoing requests
    pub network_proxy: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strategies: vec![StrategyKind::Extraction],
            proxy_base_url: None,
            metadata_base_url: None,
            artifact_dir: std::env::temp_dir(),
            naming: ArtifactNaming::Unique,
            cache_keying: CacheKeying::Canonical,
            metadata_timeout: Duration::from_secs(20),
            fetch_timeout: Duration::from_secs(180),
            extraction_timeout: Duration::from_secs(300),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrent_extractions: 2,
            audio_codec: "mp3".to_string(),
            audio_quality: "192".to_string(),
            ytdlp_path: None,
            network_proxy: None,
        }
    }
}

impl ResolverConfig {
    pub fn with_strategies(mut self, strategies: Vec<StrategyKind>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_proxy_base_url(mut self, url: Option<String>) -> Self {
        self.proxy_base_url = url;
        self
    }

    pub fn with_metadata_base_url(mut self, url: Option<String>) -> Self {
        self.metadata_base_url = url;
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Switch naming; content-hash artifacts default to the user cache dir
    /// so they outlive temp-dir sweeps.
    pub fn with_naming(mut self, naming: ArtifactNaming) -> Self {
        if naming == ArtifactNaming::ContentHash && self.artifact_dir == std::env::temp_dir() {
            if let Some(cache) = dirs::cache_dir() {
                self.artifact_dir = cache.join("audio-resolver");
            }
        }
        self.naming = naming;
        self
    }

    pub fn with_cache_keying(mut self, keying: CacheKeying) -> Self {
        self.cache_keying = keying;
        self
    }

    pub fn with_fetch_timeout(mut self, limit: Duration) -> Self {
        self.fetch_timeout = limit;
        self
    }

    pub fn with_metadata_timeout(mut self, limit: Duration) -> Self {
        self.metadata_timeout = limit;
        self
    }

    pub fn with_extraction_timeout(mut self, limit: Duration) -> Self {
        self.extraction_timeout = limit;
        self
    }

    pub fn with_max_concurrent_extractions(mut self, n: usize) -> Self {
        self.max_concurrent_extractions = n.max(1);
        self
    }

    pub fn with_ytdlp_path(mut self, path: Option<String>) -> Self {
        self.ytdlp_path = path;
        self
    }

    pub fn with_network_proxy(mut self, proxy: Option<String>) -> Self {
        self.network_proxy = proxy;
        self
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_overrides(|_| None)
    }

    /// Read the environment, letting `overrides` (e.g. command-line flags)
    /// win for any key it answers.
    pub fn from_env_with_overrides<F>(overrides: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup(|key| overrides(key).or_else(|| std::env::var(key).ok()))
    }

    /// Build from an arbitrary key lookup (environment, file, test map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default()
            .with_proxy_base_url(get("RESOLVER_PROXY_URL"))
            .with_metadata_base_url(get("RESOLVER_METADATA_URL"))
            .with_ytdlp_path(get("YTDLP_PATH"))
            .with_network_proxy(get("RESOLVER_NETWORK_PROXY"));

        config.strategies = match get("RESOLVER_STRATEGIES") {
            Some(raw) => parse_strategy_list(&raw)?,
            None => config.default_strategies(),
        };

        // Naming first: it may pick a default directory that an explicit
        // artifact dir must override.
        if let Some(naming) = get("RESOLVER_NAMING") {
            config = config.with_naming(parse_naming(&naming)?);
        }
        if let Some(dir) = get("RESOLVER_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(dir);
        }
        if let Some(keying) = get("RESOLVER_CACHE_KEYING") {
            config.cache_keying = parse_keying(&keying)?;
        }
        if let Some(secs) = get("RESOLVER_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout = Duration::from_secs(parse_number("RESOLVER_FETCH_TIMEOUT_SECS", &secs)?);
        }
        if let Some(n) = get("RESOLVER_MAX_EXTRACTIONS") {
            config.max_concurrent_extractions =
                parse_number("RESOLVER_MAX_EXTRACTIONS", &n)?.max(1) as usize;
        }

        config.validate()?;
        Ok(config)
    }

    /// Extraction first, then every backend that has a URL configured.
    pub fn default_strategies(&self) -> Vec<StrategyKind> {
        let mut kinds = vec![StrategyKind::Extraction];
        if self.proxy_base_url.is_some() {
            kinds.push(StrategyKind::Proxy);
        }
        if self.metadata_base_url.is_some() {
            kinds.push(StrategyKind::Metadata);
        }
        kinds
    }

    /// Reject configurations whose strategies lack their backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategies.is_empty() {
            return Err(ConfigError::NoStrategies);
        }
        for kind in &self.strategies {
            match kind {
                StrategyKind::Proxy if self.proxy_base_url.is_none() => {
                    return Err(ConfigError::MissingKey("RESOLVER_PROXY_URL"))
                }
                StrategyKind::Metadata if self.metadata_base_url.is_none() => {
                    return Err(ConfigError::MissingKey("RESOLVER_METADATA_URL"))
                }
                _ => {}
            }
        }
        if let Some(url) = &self.proxy_base_url {
            reqwest::Url::parse(url)
                .map_err(|e| ConfigError::invalid("RESOLVER_PROXY_URL", format!("{}: {}", url, e)))?;
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid("chunk_size", "0"));
        }
        Ok(())
    }
}

pub fn parse_naming(raw: &str) -> Result<ArtifactNaming, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "unique" | "random" => Ok(ArtifactNaming::Unique),
        "content-hash" | "hash" => Ok(ArtifactNaming::ContentHash),
        other => Err(ConfigError::invalid("RESOLVER_NAMING", other)),
    }
}

pub fn parse_keying(raw: &str) -> Result<CacheKeying, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "canonical" => Ok(CacheKeying::Canonical),
        "exact" => Ok(CacheKeying::Exact),
        other => Err(ConfigError::invalid("RESOLVER_CACHE_KEYING", other)),
    }
}

fn parse_number(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(key, raw))
}

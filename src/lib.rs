//! Resolve video references into locally playable audio files.
//!
//! A reference is either a local path (returned unchanged) or a YouTube
//! link. Links are resolved through an ordered list of strategies (local
//! yt-dlp extraction, an audio proxy, a streaming-metadata API) and the
//! resulting file is memoized for the life of the process.

pub mod config;
pub mod resolver;
pub mod search;

pub use config::{ConfigError, ResolverConfig, StrategyKind};
pub use resolver::{
    ArtifactAllocator, ArtifactNaming, AudioResolver, CacheKeying, FetchError, ResolutionCache,
    ResolutionError, ResolutionStrategy, ResolveError, StrategyOutcome, StreamingFetcher,
};
pub use search::{SearchClient, SearchError, SearchItem, SearchResults};

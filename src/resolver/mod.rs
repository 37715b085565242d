// Resolver module - reference -> local audio file, with caching and fallback

pub mod allocator;
pub mod cache;
pub mod errors;
pub mod fetcher;
pub mod models;
pub mod orchestrator;
pub mod platform;
pub mod strategies;
pub mod traits;
pub mod utils;

pub use allocator::{ArtifactAllocator, ArtifactNaming};
pub use cache::ResolutionCache;
pub use errors::{FetchError, ResolutionError, ResolveError};
pub use fetcher::StreamingFetcher;
pub use models::{AudioStream, ExtractRequest, Reference, RemoteSource, StrategyOutcome};
pub use orchestrator::AudioResolver;
pub use platform::CacheKeying;
pub use traits::{AudioExtractor, ResolutionStrategy};

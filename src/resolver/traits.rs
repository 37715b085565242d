// Strategy and extractor trait definitions

use std::path::PathBuf;

use async_trait::async_trait;

use super::errors::ResolutionError;
use super::models::{ExtractRequest, Reference, StrategyOutcome};

/// One way of turning a reference into audio.
///
/// The orchestrator holds these in priority order and falls through to the
/// next one when an attempt fails.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    /// Name of the strategy (for logging)
    fn name(&self) -> &'static str;

    async fn attempt(&self, reference: &Reference) -> Result<StrategyOutcome, ResolutionError>;
}

/// External capability that downloads and transcodes audio to a file.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce `request.expected_output()` or fail.
    async fn extract(&self, request: &ExtractRequest) -> Result<PathBuf, ResolutionError>;
}

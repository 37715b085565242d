use async_trait::async_trait;
use std::path::PathBuf;

use crate::resolver::errors::ResolutionError;
use crate::resolver::models::{Reference, StrategyOutcome};
use crate::resolver::traits::ResolutionStrategy;

/// Resolves references that already are local files.
///
/// The orchestrator runs this ahead of the cache and never caches its result.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileStrategy;

impl LocalFileStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResolutionStrategy for LocalFileStrategy {
    fn name(&self) -> &'static str {
        "local-file"
    }

    async fn attempt(&self, reference: &Reference) -> Result<StrategyOutcome, ResolutionError> {
        match tokio::fs::metadata(reference.as_str()).await {
            Ok(meta) if meta.is_file() => {
                Ok(StrategyOutcome::ResolvedFile(PathBuf::from(reference.as_str())))
            }
            _ => Err(ResolutionError::UnsupportedReference(format!(
                "not a local file: {}",
                reference
            ))),
        }
    }
}

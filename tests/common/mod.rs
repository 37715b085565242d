#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;

use audio_resolver::resolver::{Reference, StrategyOutcome};
use audio_resolver::{
    ArtifactAllocator, ArtifactNaming, AudioResolver, ResolutionCache, ResolutionError,
    ResolutionStrategy, StreamingFetcher,
};

/// Bind an ephemeral port, build the router knowing its own address, and serve it.
pub async fn serve<F>(build: F) -> SocketAddr
where
    F: FnOnce(SocketAddr) -> Router,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build(addr);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn resolver(dir: &Path) -> AudioResolver {
    resolver_with(dir, ArtifactNaming::Unique)
}

pub fn resolver_with(dir: &Path, naming: ArtifactNaming) -> AudioResolver {
    AudioResolver::new(
        Arc::new(ResolutionCache::new()),
        ArtifactAllocator::new(dir, naming),
        StreamingFetcher::new(reqwest::Client::new()),
    )
    .with_fetch_timeout(Duration::from_secs(10))
}

/// Names of regular files directly inside `dir`.
pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}

/// Fake strategy that counts invocations and writes a small artifact.
pub struct CountingStrategy {
    pub name: &'static str,
    pub calls: Arc<AtomicUsize>,
    dir: PathBuf,
    delay: Duration,
    failure: Option<ResolutionError>,
}

impl CountingStrategy {
    pub fn succeeding(dir: &Path) -> Self {
        Self {
            name: "counting",
            calls: Arc::new(AtomicUsize::new(0)),
            dir: dir.to_path_buf(),
            delay: Duration::ZERO,
            failure: None,
        }
    }

    pub fn failing(dir: &Path, error: ResolutionError) -> Self {
        Self {
            name: "failing",
            failure: Some(error),
            ..Self::succeeding(dir)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ResolutionStrategy for CountingStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn attempt(&self, reference: &Reference) -> Result<StrategyOutcome, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let path = tempfile::Builder::new()
            .prefix("fake-")
            .suffix(".mp3")
            .tempfile_in(&self.dir)
            .unwrap()
            .into_temp_path()
            .keep()
            .unwrap();
        std::fs::write(&path, reference.as_str()).unwrap();
        Ok(StrategyOutcome::ResolvedFile(path))
    }
}

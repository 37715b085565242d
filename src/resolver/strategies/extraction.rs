// Direct extraction - runs the native `yt-dlp` binary to download and transcode audio
//
// The external process is CPU and I/O heavy, so attempts are gated by a
// semaphore: at most `max_concurrent` extractions run at once and the rest
// wait without holding up unrelated resolutions.
//
// yt-dlp always works under a private random stem and leaves side files
// (`{stem}.webm`, `{stem}.webm.part`, `{stem}.temp.mp3`) behind when it dies.
// The finished file is renamed onto the artifact path; on failure every
// `{stem}.*` file is removed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::resolver::allocator::{ArtifactAllocator, ArtifactNaming};
use crate::resolver::errors::ResolutionError;
use crate::resolver::models::{ExtractRequest, Reference, StrategyOutcome};
use crate::resolver::platform;
use crate::resolver::traits::{AudioExtractor, ResolutionStrategy};
use crate::resolver::utils::{run_output_with_timeout, CommandOutcome};

/// Per-socket timeout handed to yt-dlp.
pub const SOCKET_TIMEOUT_SECS: u64 = 30;

/// `yt-dlp` invoked as a child process.
pub struct YtDlpExtractor {
    ytdlp_path: String,
    timeout: Duration,
    proxy: Option<String>,
}

impl YtDlpExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            ytdlp_path: Self::find_ytdlp(),
            timeout,
            proxy: None,
        }
    }

    pub fn with_path(mut self, path: Option<String>) -> Self {
        if let Some(path) = path {
            self.ytdlp_path = path;
        }
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn binary_path(&self) -> &str {
        &self.ytdlp_path
    }

    /// Find yt-dlp binary
    fn find_ytdlp() -> String {
        let common_paths = [
            "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
            "/usr/local/bin/yt-dlp",    // Homebrew on Intel Mac
            "/usr/bin/yt-dlp",          // System installation
        ];

        for path in common_paths {
            if Path::new(path).exists() {
                return path.to_string();
            }
        }

        if let Ok(output) = StdCommand::new("which").arg("yt-dlp").output() {
            if output.status.success() {
                if let Ok(path) = String::from_utf8(output.stdout) {
                    let trimmed = path.trim();
                    if !trimmed.is_empty() {
                        return trimmed.to_string();
                    }
                }
            }
        }

        "yt-dlp".to_string()
    }

    fn build_args(&self, request: &ExtractRequest) -> Vec<String> {
        let template = format!("{}.%(ext)s", request.output_stem.display());
        let mut args = vec![
            "-f".to_string(),
            "bestaudio/best".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--quiet".to_string(),
            "--force-overwrites".to_string(),
            "--socket-timeout".to_string(),
            SOCKET_TIMEOUT_SECS.to_string(),
            "-x".to_string(),
            "--audio-format".to_string(),
            request.codec.clone(),
            "--audio-quality".to_string(),
            format!("{}K", request.quality),
            "-o".to_string(),
            template,
        ];

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(request.source_url.clone());
        args
    }
}

#[async_trait]
impl AudioExtractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(&self, request: &ExtractRequest) -> Result<PathBuf, ResolutionError> {
        let args = self.build_args(request);
        debug!("[yt-dlp] running: {} {}", self.ytdlp_path, args.join(" "));

        let outcome = run_output_with_timeout(&self.ytdlp_path, &args, self.timeout)
            .await
            .map_err(|e| {
                ResolutionError::extraction_failed(&format!("failed to start {}: {}", self.ytdlp_path, e))
            })?;

        let output = match outcome {
            CommandOutcome::Finished(output) => output,
            CommandOutcome::TimedOut => {
                return Err(ResolutionError::Timeout {
                    step: "extraction",
                    seconds: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolutionError::from_extractor_output(
                &stderr,
                SOCKET_TIMEOUT_SECS,
            ));
        }

        let produced = request.expected_output();
        match tokio::fs::metadata(&produced).await {
            Ok(meta) if meta.len() > 0 => Ok(produced),
            _ => Err(ResolutionError::extraction_failed(
                "yt-dlp failed to download audio",
            )),
        }
    }
}

/// Strategy that writes a transcoded artifact straight to an allocated path.
pub struct ExtractionStrategy {
    extractor: Arc<dyn AudioExtractor>,
    allocator: ArtifactAllocator,
    permits: Arc<Semaphore>,
    codec: String,
    quality: String,
}

impl ExtractionStrategy {
    pub fn new(
        extractor: Arc<dyn AudioExtractor>,
        allocator: ArtifactAllocator,
        max_concurrent: usize,
    ) -> Self {
        Self {
            extractor,
            allocator,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            codec: "mp3".to_string(),
            quality: "192".to_string(),
        }
    }

    pub fn with_format(mut self, codec: impl Into<String>, quality: impl Into<String>) -> Self {
        self.codec = codec.into();
        self.quality = quality.into();
        self
    }
}

#[async_trait]
impl ResolutionStrategy for ExtractionStrategy {
    fn name(&self) -> &'static str {
        "extraction"
    }

    async fn attempt(&self, reference: &Reference) -> Result<StrategyOutcome, ResolutionError> {
        if reference.video_id().is_none() {
            return Err(ResolutionError::UnsupportedReference(
                reference.as_str().to_string(),
            ));
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ResolutionError::extraction_failed("extraction pool closed"))?;

        let suffix = format!(".{}", self.codec);
        let dest = self
            .allocator
            .allocate(&platform::artifact_key(reference), &suffix)?;
        let work = match self.allocator.naming() {
            ArtifactNaming::Unique => dest.clone(),
            ArtifactNaming::ContentHash => self.allocator.reserve_unique(&suffix)?,
        };
        let stem = work.with_extension("");
        let request = ExtractRequest {
            source_url: reference.as_str().to_string(),
            output_stem: stem.clone(),
            codec: self.codec.clone(),
            quality: self.quality.clone(),
        };

        info!("[extraction] {} via {}", reference, self.extractor.name());
        let produced = match self.extractor.extract(&request).await {
            Ok(path) => path,
            Err(e) => {
                remove_stem_files(&stem).await;
                return Err(e);
            }
        };

        if produced != dest {
            if let Err(e) = tokio::fs::rename(&produced, &dest).await {
                remove_stem_files(&stem).await;
                return Err(e.into());
            }
        }
        Ok(StrategyOutcome::ResolvedFile(dest))
    }
}

/// Remove every `{stem}.*` file: the reserved name plus whatever the extractor left.
async fn remove_stem_files(stem: &Path) {
    let (dir, name) = match (stem.parent(), stem.file_name()) {
        (Some(dir), Some(name)) => (dir, name.to_string_lossy().into_owned()),
        _ => return,
    };
    let prefix = format!("{}.", name);

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("could not scan {} for leftovers: {}", dir.display(), e);
            return;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if !entry.file_name().to_string_lossy().starts_with(&prefix) {
            continue;
        }
        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("removed extractor leftover {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove {}: {}", path.display(), e),
        }
    }
}

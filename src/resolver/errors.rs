// Error types for audio resolution

use thiserror::Error;

use super::utils::excerpt;

/// Upper bound for any diagnostic text carried by an error.
pub const MAX_EXCERPT_CHARS: usize = 300;

/// Why a single resolution attempt failed.
///
/// Strategies return the most specific kind they can; the orchestrator never
/// reinterprets it, only wraps it in a [`ResolveError`] with the reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Reference matches no known platform URL shape
    #[error("Unsupported reference: {0}")]
    UnsupportedReference(String),

    /// Proxy or metadata API answered with a non-success status, or could not be reached
    #[error("{backend} unavailable{}: {excerpt}", status_suffix(.status))]
    BackendUnavailable {
        backend: &'static str,
        status: Option<u16>,
        excerpt: String,
    },

    /// Metadata API listed zero usable audio streams
    #[error("No audio streams available for {0}")]
    NoAudioAvailable(String),

    /// A network step or the external extractor exceeded its bound
    #[error("{step} timed out after {seconds}s")]
    Timeout { step: &'static str, seconds: u64 },

    /// External extractor errored or produced no output file
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl ResolutionError {
    pub fn backend_unavailable(backend: &'static str, status: Option<u16>, body: &str) -> Self {
        Self::BackendUnavailable {
            backend,
            status,
            excerpt: excerpt(body, MAX_EXCERPT_CHARS),
        }
    }

    pub fn extraction_failed(detail: &str) -> Self {
        Self::ExtractionFailed(excerpt(detail, MAX_EXCERPT_CHARS))
    }

    /// Classify the stderr of a failed extractor run.
    ///
    /// A timeout reported by the extractor itself is its per-socket timeout
    /// giving up, not the overall extraction bound, which the caller enforces
    /// by killing the process.
    pub fn from_extractor_output(stderr: &str, socket_timeout_secs: u64) -> Self {
        let lower = stderr.to_lowercase();
        if lower.contains("timed out") || lower.contains("timeout") {
            return Self::Timeout {
                step: "extractor socket",
                seconds: socket_timeout_secs,
            };
        }
        if lower.contains("unsupported url") {
            return Self::UnsupportedReference(excerpt(stderr.trim(), MAX_EXCERPT_CHARS));
        }
        let detail = stderr.trim();
        if detail.is_empty() {
            Self::extraction_failed("extractor exited without output")
        } else {
            Self::extraction_failed(detail)
        }
    }
}

impl From<std::io::Error> for ResolutionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(excerpt(&e.to_string(), MAX_EXCERPT_CHARS))
    }
}

/// Failure of one `resolve` call, carrying the reference that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error resolving audio for {reference}: {kind}")]
pub struct ResolveError {
    pub reference: String,
    #[source]
    pub kind: ResolutionError,
}

impl ResolveError {
    pub fn new(reference: impl Into<String>, kind: ResolutionError) -> Self {
        Self {
            reference: reference.into(),
            kind,
        }
    }

    pub fn kind(&self) -> &ResolutionError {
        &self.kind
    }

    /// Message suitable for a chat or log surface, bounded in length.
    pub fn user_message(&self) -> String {
        excerpt(&self.to_string(), MAX_EXCERPT_CHARS)
    }
}

/// Failure of the streaming fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Remote answered with a non-success status
    #[error("HTTP {0}: {1}")]
    BadStatus(u16, String),

    /// Overall fetch deadline elapsed
    #[error("fetch timed out after {0}s")]
    Timeout(u64),

    /// Destination could not be written
    #[error("write failed: {0}")]
    Io(String),

    /// Connection failed or dropped mid-body
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(excerpt(&e.to_string(), MAX_EXCERPT_CHARS))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(excerpt(&e.to_string(), MAX_EXCERPT_CHARS))
    }
}

impl FetchError {
    /// Attribute a fetch failure to the backend that supplied the stream.
    pub fn into_resolution(self, backend: &'static str) -> ResolutionError {
        match self {
            Self::BadStatus(code, body) => {
                ResolutionError::backend_unavailable(backend, Some(code), &body)
            }
            Self::Timeout(seconds) => ResolutionError::Timeout {
                step: "fetch",
                seconds,
            },
            Self::Io(msg) => ResolutionError::Io(msg),
            Self::Transport(msg) => ResolutionError::backend_unavailable(backend, None, &msg),
        }
    }
}

// Common data models for resolution

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::platform;

/// A media reference as handed to the resolver: a local path or a platform URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    raw: String,
    video_id: Option<String>,
}

impl Reference {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            video_id: platform::extract_video_id(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Platform id, when the reference matched a known URL shape.
    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Remote byte stream to be consumed by the streaming fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSource {
    pub url: String,
    /// File extension (without dot) suggested for the downloaded artifact
    pub extension: String,
    /// Backend that produced the URL, used to attribute fetch failures
    pub backend: &'static str,
}

/// Successful result of one strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// A ready local artifact
    ResolvedFile(PathBuf),
    /// A stream the orchestrator must download
    RemoteSource(RemoteSource),
}

/// Audio stream descriptor returned by the metadata API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStream {
    pub url: String,
    #[serde(default)]
    pub bitrate: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl AudioStream {
    /// File extension implied by the stream's MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_deref() {
            Some(m) if m.starts_with("audio/webm") => "webm",
            Some(m) if m.starts_with("audio/mpeg") => "mp3",
            Some(m) if m.starts_with("audio/ogg") => "ogg",
            _ => "m4a",
        }
    }
}

/// Body of `GET {base}/streams/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamsResponse {
    #[serde(default)]
    pub audio_streams: Vec<AudioStream>,
}

/// Request handed to an external extraction backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub source_url: String,
    /// Output path without extension; the backend appends `.{codec}`
    pub output_stem: PathBuf,
    pub codec: String,
    pub quality: String,
}

impl ExtractRequest {
    /// Path the backend is expected to produce.
    pub fn expected_output(&self) -> PathBuf {
        self.output_stem.with_extension(&self.codec)
    }
}

// Artifact path allocation

use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

/// Extensions checked when looking for an artifact left by a previous run.
const KNOWN_AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "m4a", "webm", "ogg"];

/// How artifact file names are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactNaming {
    /// Fresh random name per allocation, reserved on disk
    #[default]
    Unique,
    /// Stable name derived from a SHA-256 of the cache key, so artifacts
    /// survive process restarts within the same directory
    ContentHash,
}

/// Hands out destination paths for new audio artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactAllocator {
    dir: PathBuf,
    naming: ArtifactNaming,
}

impl ArtifactAllocator {
    pub fn new(dir: impl Into<PathBuf>, naming: ArtifactNaming) -> Self {
        Self {
            dir: dir.into(),
            naming,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn naming(&self) -> ArtifactNaming {
        self.naming
    }

    /// Allocate a path ending in `suffix` (e.g. `".mp3"`).
    ///
    /// In `Unique` mode an empty file is created with `O_EXCL` semantics so no
    /// concurrent allocation can receive the same name. In `ContentHash` mode
    /// the same key always yields the same path and nothing is created.
    pub fn allocate(&self, key: &str, suffix: &str) -> io::Result<PathBuf> {
        let path = match self.naming {
            ArtifactNaming::Unique => self.reserve_unique(suffix)?,
            ArtifactNaming::ContentHash => {
                std::fs::create_dir_all(&self.dir)?;
                self.dir.join(format!("{}{}", digest(key), suffix))
            }
        };
        debug!("allocated artifact path {}", path.display());
        Ok(path)
    }

    /// Reserve a fresh random `audio-XXXXXXXXXXXX{suffix}` name regardless of
    /// the naming mode, for work that must not share files with anyone else.
    pub fn reserve_unique(&self, suffix: &str) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        tempfile::Builder::new()
            .prefix("audio-")
            .suffix(suffix)
            .rand_bytes(12)
            .tempfile_in(&self.dir)?
            .into_temp_path()
            .keep()
            .map_err(|e| e.error)
    }

    /// Non-empty artifact left on disk for `key`, if the naming mode allows finding one.
    pub fn find_existing(&self, key: &str) -> Option<PathBuf> {
        if self.naming != ArtifactNaming::ContentHash {
            return None;
        }
        let stem = digest(key);
        KNOWN_AUDIO_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", stem, ext)))
            .find(|p| std::fs::metadata(p).map(|m| m.is_file() && m.len() > 0).unwrap_or(false))
    }
}

fn digest(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    format!("{:x}", hash)[..16].to_string()
}

// Streaming HTTP download into a local artifact

use std::path::Path;
use std::time::Duration;

use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::errors::FetchError;
use super::utils::body_excerpt;

pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

/// Downloads a remote body to disk in bounded chunks under an overall deadline.
///
/// Bytes go to a `.{name}.XXXXXXXX.part` file next to `dest`, private to this
/// fetch, which is renamed onto `dest` only after the body completed. Any
/// failure, including the caller dropping the future, removes that file, so
/// `dest` never holds a truncated artifact and concurrent fetches of the same
/// `dest` never touch each other's partial data.
#[derive(Debug, Clone)]
pub struct StreamingFetcher {
    client: reqwest::Client,
    chunk_size: usize,
}

impl StreamingFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fetch `url` into `dest`, returning the number of bytes written.
    pub async fn fetch(&self, url: &str, dest: &Path, limit: Duration) -> Result<u64, FetchError> {
        let part = reserve_partial(dest)?;

        let written = match timeout(limit, self.stream_to(url, &part)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("fetch of {} exceeded {:?}", url, limit);
                return Err(FetchError::Timeout(limit.as_secs()));
            }
        };

        part.persist(dest).map_err(|e| FetchError::from(e.error))?;
        debug!("fetched {} bytes into {}", written, dest.display());
        Ok(written)
    }

    async fn stream_to(&self, url: &str, part: &Path) -> Result<u64, FetchError> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus(
                status.as_u16(),
                body_excerpt(response).await,
            ));
        }
        let expected = response.content_length();

        let file = File::create(part).await?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        if written == 0 {
            return Err(FetchError::Transport("empty response body".to_string()));
        }
        if let Some(expected) = expected {
            if written < expected {
                return Err(FetchError::Transport(format!(
                    "body truncated at {} of {} bytes",
                    written, expected
                )));
            }
        }
        Ok(written)
    }
}

/// Create a uniquely named partial file beside `dest`; it is deleted on drop
/// unless persisted.
fn reserve_partial(dest: &Path) -> std::io::Result<TempPath> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let part = tempfile::Builder::new()
        .prefix(&format!(".{}.", name))
        .suffix(".part")
        .rand_bytes(8)
        .tempfile_in(dir)?
        .into_temp_path();
    Ok(part)
}

// Helper functions shared by strategies and the fetcher

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::warn;

use super::errors::MAX_EXCERPT_CHARS;

/// Outcome of an external command that was allowed to run to completion.
#[derive(Debug)]
pub enum CommandOutcome {
    Finished(std::process::Output),
    TimedOut,
}

/// Truncate `text` to at most `max_chars` characters, marking the cut with an ellipsis.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}

/// Build a reqwest client with an optional HTTP/SOCKS proxy.
pub fn build_http_client(proxy: Option<&str>) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(proxy_url) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }
    builder.build()
}

/// Bytes of an error body read before it is cut down to an excerpt.
pub const ERROR_BODY_PREFIX_BYTES: usize = 1024;

/// Diagnostic excerpt of an error response, read from a bounded body prefix.
pub async fn body_excerpt(mut response: reqwest::Response) -> String {
    let mut prefix: Vec<u8> = Vec::new();
    while prefix.len() < ERROR_BODY_PREFIX_BYTES {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = ERROR_BODY_PREFIX_BYTES - prefix.len();
                prefix.extend_from_slice(&chunk[..chunk.len().min(room)]);
            }
            _ => break,
        }
    }
    let text = String::from_utf8_lossy(&prefix);
    excerpt(text.trim(), MAX_EXCERPT_CHARS)
}

/// Run a command, capturing stdout/stderr, killing it if it outlives `limit`.
///
/// Spawn failures are returned as `Err`; a timeout is reported as
/// [`CommandOutcome::TimedOut`] after the child has been killed.
pub async fn run_output_with_timeout(
    program: &str,
    args: &[String],
    limit: Duration,
) -> std::io::Result<CommandOutcome> {
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other(format!("no stdout from {}", program)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other(format!("no stderr from {}", program)))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(limit, child.wait()).await {
        Ok(status) => {
            let status = status?;
            let stdout = stdout_task.await.map_err(std::io::Error::other)??;
            let stderr = stderr_task.await.map_err(std::io::Error::other)??;
            Ok(CommandOutcome::Finished(std::process::Output {
                status,
                stdout,
                stderr,
            }))
        }
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!("failed to kill {} after timeout: {}", program, e);
            }
            stdout_task.abort();
            stderr_task.abort();
            Ok(CommandOutcome::TimedOut)
        }
    }
}

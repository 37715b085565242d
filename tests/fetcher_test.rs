mod common;

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use futures::StreamExt;

use audio_resolver::resolver::errors::MAX_EXCERPT_CHARS;
use audio_resolver::{FetchError, StreamingFetcher};

use common::{files_in, serve};

const BODY_SIZE: usize = 512 * 1024;

fn audio_bytes() -> Vec<u8> {
    (0..BODY_SIZE).map(|i| (i % 251) as u8).collect()
}

fn app() -> Router {
    Router::new()
        .route("/audio", get(|| async { audio_bytes() }))
        .route(
            "/overloaded",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        )
        .route(
            "/verbose-error",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded ".repeat(200_000)) }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .route(
            "/trickle",
            get(|| async {
                let stream = futures::stream::iter(0..20).then(|_| async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<_, std::io::Error>(Bytes::from(vec![7u8; 1024]))
                });
                Body::from_stream(stream)
            }),
        )
        .route(
            "/dropped",
            get(|| async {
                let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
                    Ok(Bytes::from(vec![1u8; 64 * 1024])),
                    Err(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        "peer went away",
                    )),
                ];
                let stream = futures::stream::iter(chunks).then(|chunk| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    chunk
                });
                Body::from_stream(stream)
            }),
        )
}

#[tokio::test]
async fn test_fetch_writes_complete_body() {
    let addr = serve(|_| app()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("song.mp3");

    let fetcher = StreamingFetcher::new(reqwest::Client::new()).with_chunk_size(16 * 1024);
    let written = fetcher
        .fetch(&format!("http://{}/audio", addr), &dest, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(written, BODY_SIZE as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), audio_bytes());
    assert_eq!(files_in(dir.path()), vec![dest]);
}

#[tokio::test]
async fn test_fetch_bad_status_carries_body_excerpt() {
    let addr = serve(|_| app()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("song.mp3");

    let err = StreamingFetcher::new(reqwest::Client::new())
        .fetch(&format!("http://{}/overloaded", addr), &dest, Duration::from_secs(10))
        .await
        .unwrap_err();

    assert_eq!(err, FetchError::BadStatus(503, "overloaded".to_string()));
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_fetch_large_error_body_is_cut_to_excerpt() {
    let addr = serve(|_| app()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("song.mp3");

    let err = StreamingFetcher::new(reqwest::Client::new())
        .fetch(&format!("http://{}/verbose-error", addr), &dest, Duration::from_secs(10))
        .await
        .unwrap_err();

    match err {
        FetchError::BadStatus(code, excerpt) => {
            assert_eq!(code, 502);
            assert!(excerpt.starts_with("upstream exploded"));
            assert!(excerpt.chars().count() <= MAX_EXCERPT_CHARS);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_concurrent_fetches_of_one_destination_both_complete() {
    let addr = serve(|_| app()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("shared.mp3");
    let url = format!("http://{}/trickle", addr);

    let fetcher = StreamingFetcher::new(reqwest::Client::new());
    let (a, b) = tokio::join!(
        fetcher.fetch(&url, &dest, Duration::from_secs(10)),
        fetcher.fetch(&url, &dest, Duration::from_secs(10)),
    );

    assert_eq!(a.unwrap(), 20 * 1024);
    assert_eq!(b.unwrap(), 20 * 1024);
    assert_eq!(std::fs::read(&dest).unwrap(), vec![7u8; 20 * 1024]);
    assert_eq!(files_in(dir.path()), vec![dest]);
}

#[tokio::test]
async fn test_fetch_timeout_leaves_nothing_behind() {
    let addr = serve(|_| app()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("song.mp3");

    let err = StreamingFetcher::new(reqwest::Client::new())
        .fetch(&format!("http://{}/slow", addr), &dest, Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Timeout(_)));
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_fetch_dropped_connection_is_not_an_artifact() {
    let addr = serve(|_| app()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("song.mp3");

    let err = StreamingFetcher::new(reqwest::Client::new())
        .fetch(&format!("http://{}/dropped", addr), &dest, Duration::from_secs(10))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transport(_)), "got {:?}", err);
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_fetch_cancelled_mid_stream_removes_partial_file() {
    let addr = serve(|_| app()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("song.mp3");

    let fetcher = StreamingFetcher::new(reqwest::Client::new()).with_chunk_size(512);
    let url = format!("http://{}/trickle", addr);
    let fetch = fetcher.fetch(&url, &dest, Duration::from_secs(30));
    // Dropping the future mid-body is a cancellation, not a timeout inside fetch.
    let outcome = tokio::time::timeout(Duration::from_millis(450), fetch).await;
    assert!(outcome.is_err());

    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_fetch_unreachable_host_is_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("song.mp3");

    // Bind and immediately drop to get a port with nothing listening.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = StreamingFetcher::new(reqwest::Client::new())
        .fetch(&format!("http://127.0.0.1:{}/audio", port), &dest, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transport(_)));
    assert!(files_in(dir.path()).is_empty());
}

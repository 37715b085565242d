mod common;

use std::collections::HashMap;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde_json::json;

use audio_resolver::{SearchClient, SearchError};

use common::serve;

fn app() -> Router {
    Router::new().route(
        "/search",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            if params.get("key").map(String::as_str) != Some("test-key") {
                return (StatusCode::FORBIDDEN, "API key not valid".to_string());
            }
            let q = params.get("q").cloned().unwrap_or_default();
            let body = json!({
                "items": [
                    {
                        "id": { "kind": "youtube#video", "videoId": "dQw4w9WgXcQ" },
                        "snippet": {
                            "title": format!("{} (official)", q),
                            "thumbnails": {
                                "default": { "url": "https://i.ytimg.com/default.jpg" },
                                "high": { "url": "https://i.ytimg.com/high.jpg" }
                            }
                        }
                    },
                    {
                        "id": { "kind": "youtube#channel", "channelId": "UC123" },
                        "snippet": { "title": "a channel" }
                    }
                ]
            });
            (StatusCode::OK, body.to_string())
        }),
    )
}

#[tokio::test]
async fn test_search_returns_video_hits_with_watch_links() {
    let addr = serve(|_| app()).await;
    let client = SearchClient::new(reqwest::Client::new(), "test-key")
        .with_base_url(format!("http://{}/", addr));

    let results = client.search("never gonna").await.unwrap();

    assert_eq!(results.items.len(), 1);
    let hit = &results.items[0];
    assert_eq!(hit.video_id, "dQw4w9WgXcQ");
    assert_eq!(hit.title, "never gonna (official)");
    assert_eq!(hit.link, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    assert_eq!(hit.thumbnail, "https://i.ytimg.com/high.jpg");
}

#[tokio::test]
async fn test_search_rejected_key_is_api_error() {
    let addr = serve(|_| app()).await;
    let client = SearchClient::new(reqwest::Client::new(), "wrong-key")
        .with_base_url(format!("http://{}", addr));

    let err = client.search("anything").await.unwrap_err();

    assert_eq!(err, SearchError::ApiError(403, "API key not valid".to_string()));
}

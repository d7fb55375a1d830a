//! Integration tests for the provider chain.
//!
//! Provider ordering and failover use in-process stubs; the tikwm provider is
//! exercised against a wiremock server.

use std::sync::Arc;

use ttrelay_core::fetch::{FetchError, MediaFetcher, ProviderTag, TikwmProvider};
use ttrelay_core::{MediaProvider, MediaReference};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::fakes::{Shared, StubProvider};
use support::socket_guard::start_mock_server_or_skip;

fn reference() -> MediaReference {
    MediaReference::link("https://vm.tiktok.com/ZMabc/")
}

#[tokio::test]
async fn test_fetch_primary_success_skips_fallback() {
    let primary = Arc::new(StubProvider::writing("tikwm", ProviderTag::Primary, "a.mp4", 10));
    let fallback = Arc::new(StubProvider::writing("yt-dlp", ProviderTag::Fallback, "b.mp4", 10));
    let mut fetcher = MediaFetcher::new();
    fetcher.register(Box::new(Shared(Arc::clone(&fallback))));
    fetcher.register(Box::new(Shared(Arc::clone(&primary))));

    let dir = tempfile::tempdir().unwrap();
    let fetched = fetcher.fetch(&reference(), dir.path()).await.unwrap();

    assert_eq!(fetched.media.provenance, ProviderTag::Primary);
    assert!(!fetched.is_downgraded());
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 0, "fallback must not run after a primary success");
}

#[tokio::test]
async fn test_fetch_falls_back_and_records_downgrade() {
    let mut fetcher = MediaFetcher::new();
    fetcher.register(Box::new(StubProvider::failing(
        "tikwm",
        ProviderTag::Primary,
        "Url parsing is failed!",
    )));
    fetcher.register(Box::new(StubProvider::writing(
        "yt-dlp",
        ProviderTag::Fallback,
        "clip.mp4",
        1024,
    )));

    let dir = tempfile::tempdir().unwrap();
    let fetched = fetcher.fetch(&reference(), dir.path()).await.unwrap();

    assert_eq!(fetched.media.provenance, ProviderTag::Fallback);
    assert_eq!(fetched.media.local_path, dir.path().join("clip.mp4"));
    assert!(fetched.is_downgraded());
    assert_eq!(fetched.skipped.len(), 1);
    assert_eq!(fetched.skipped[0].provider, "tikwm");
    assert!(fetched.skipped[0].message.contains("Url parsing is failed!"));
}

#[tokio::test]
async fn test_fetch_both_fail_surfaces_fallback_cause() {
    let mut fetcher = MediaFetcher::new();
    fetcher.register(Box::new(StubProvider::failing(
        "tikwm",
        ProviderTag::Primary,
        "HTTP 500",
    )));
    fetcher.register(Box::new(StubProvider::failing(
        "yt-dlp",
        ProviderTag::Fallback,
        "Unsupported URL",
    )));

    let dir = tempfile::tempdir().unwrap();
    let err = fetcher.fetch(&reference(), dir.path()).await.unwrap_err();

    assert!(matches!(err, FetchError::PrimaryExhausted { .. }));
    assert_eq!(err.failures().len(), 2);
    let msg = err.to_string();
    assert!(msg.contains("Unsupported URL"), "got: {msg}");
    assert_eq!(
        std::fs::read_dir(dir.path()).unwrap().count(),
        0,
        "no scratch files should remain"
    );
}

#[tokio::test]
async fn test_tikwm_downloads_relative_play_url() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/api/"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("url=https%3A%2F%2Fvm.tiktok.com%2FZMabc%2F"))
        .and(body_string_contains("hd=1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "msg": "success",
            "data": {
                "id": "7301234567890123456",
                "play": "/video/media/play/7301234567890123456.mp4",
                "author": { "unique_id": "dancer" },
                "create_time": 1_700_000_000
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/video/media/play/7301234567890123456.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake mp4 bytes".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = TikwmProvider::with_base_url(reqwest::Client::new(), mock_server.uri());
    let dir = tempfile::tempdir().unwrap();
    let media = provider.fetch(&reference(), dir.path()).await.unwrap();

    assert_eq!(media.author_handle, "dancer");
    assert_eq!(media.created_at_unix_seconds, 1_700_000_000);
    assert_eq!(media.provenance, ProviderTag::Primary);
    assert_eq!(media.local_path.parent(), Some(dir.path()));
    assert_eq!(std::fs::read(&media.local_path).unwrap(), b"fake mp4 bytes");
}

#[tokio::test]
async fn test_tikwm_nonzero_code_is_rejected() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/api/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": -1,
            "msg": "Url parsing is failed! Please check url."
        })))
        .mount(&mock_server)
        .await;

    let provider = TikwmProvider::with_base_url(reqwest::Client::new(), mock_server.uri());
    let dir = tempfile::tempdir().unwrap();
    let err = provider.fetch(&reference(), dir.path()).await.unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("tikwm rejected"), "got: {msg}");
    assert!(msg.contains("Url parsing is failed!"), "got: {msg}");
}

#[tokio::test]
async fn test_tikwm_media_404_leaves_no_partial_file() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/api/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "msg": "success",
            "data": {
                "id": "1",
                "play": format!("{}/gone.mp4", mock_server.uri()),
                "author": { "unique_id": "dancer" }
            }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let provider = TikwmProvider::with_base_url(reqwest::Client::new(), mock_server.uri());
    let dir = tempfile::tempdir().unwrap();
    let err = provider.fetch(&reference(), dir.path()).await.unwrap_err();

    assert!(err.to_string().contains("HTTP 404"), "got: {err}");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

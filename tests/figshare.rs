mod common;

use assert_matches::assert_matches;

use figmirror::domain::ArticleId;
use figmirror::error::MirrorError;
use figmirror::figshare::{CatalogClient, FigshareHttpClient};

use common::{Scripted, TestServer};

#[test]
fn fetches_and_parses_the_article_listing() {
    let payload = br#"{
        "id": 22202866,
        "files": [
            {"name": "002-001.tar.gz", "download_url": "https://ndownloader.example/1"},
            {"name": "002-002.tar.gz", "download_url": "https://ndownloader.example/2"}
        ]
    }"#;
    let server = TestServer::start(vec![Scripted::Ok(payload.to_vec())]);
    let client = FigshareHttpClient::with_base_url(server.url(""), None).unwrap();

    let article: ArticleId = "22202866".parse().unwrap();
    let entries = client.fetch_catalog(&article).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "002-001.tar.gz");
    assert_eq!(entries[1].download_url, "https://ndownloader.example/2");
}

#[test]
fn error_status_is_fatal_not_retried() {
    let server = TestServer::start(vec![Scripted::Error500]);
    let client = FigshareHttpClient::with_base_url(server.url(""), None).unwrap();

    let article: ArticleId = "22202866".parse().unwrap();
    let err = client.fetch_catalog(&article).unwrap_err();

    assert_matches!(err, MirrorError::CatalogStatus { status: 500, .. });
    // Exactly one request: the catalog seam has no retry loop.
    assert_eq!(server.hits(), 1);
}

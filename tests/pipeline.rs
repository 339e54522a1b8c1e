mod common;

use std::sync::Arc;
use std::time::Duration;

use figmirror::archive::ExtractOptions;
use figmirror::domain::{CatalogEntry, PipelineOutcome};
use figmirror::download::RetryPolicy;
use figmirror::pipeline::{PipelineSettings, mirror_file};

use common::{BrokenFactory, MemoryFactory, Scripted, SharedStore, TestServer, tar_gz_bytes};

fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        base_prefix: "real-colon-dataset".to_string(),
        retry: RetryPolicy {
            max_attempts: 2,
            retry_delay: Duration::from_millis(5),
        },
        ca_bundle: None,
        extract: ExtractOptions::default(),
    }
}

#[test]
fn pipeline_reports_uploaded_blob_count() {
    let archive = tar_gz_bytes(&[
        ("002-001/video.mp4", b"video".as_slice()),
        ("002-001/frames/0001.jpg", b"jpg1".as_slice()),
        ("002-001/frames/0002.jpg", b"jpg2".as_slice()),
    ]);
    let server = TestServer::start(vec![Scripted::Ok(archive)]);
    let shared = Arc::new(SharedStore::default());
    let factory = MemoryFactory(shared.clone());

    let entry = CatalogEntry {
        name: "002-001.tar.gz".to_string(),
        download_url: server.url("/files/002-001"),
    };

    let report = mirror_file(&entry, &factory, &fast_settings());

    assert_eq!(report.file_name, "002-001.tar.gz");
    assert_eq!(report.outcome, PipelineOutcome::Uploaded(3));
    assert_eq!(
        shared.keys_under("real-colon-dataset/002-001").len(),
        3
    );
}

#[test]
fn pipeline_absorbs_failures_into_sentinel() {
    let entry = CatalogEntry {
        name: "002-001.tar.gz".to_string(),
        download_url: "http://127.0.0.1:1/unreachable".to_string(),
    };

    // Store connection refused: the boundary turns it into Failed.
    let report = mirror_file(&entry, &BrokenFactory, &fast_settings());
    assert_eq!(report.outcome, PipelineOutcome::Failed);
}

#[test]
fn exhausted_download_becomes_failed_report() {
    let server = TestServer::start(vec![Scripted::Error500]);
    let shared = Arc::new(SharedStore::default());
    let factory = MemoryFactory(shared.clone());

    let entry = CatalogEntry {
        name: "002-001.tar.gz".to_string(),
        download_url: server.url("/files/002-001"),
    };

    let report = mirror_file(&entry, &factory, &fast_settings());

    assert_eq!(report.outcome, PipelineOutcome::Failed);
    assert_eq!(server.hits(), 2);
    assert!(shared.keys().is_empty());
}

use super::*;
use crate::error::FetchError;
use crate::fetch::HttpFetcher;
use crate::test_helpers::{FakeFetcher, read_zip_entries, zip_entry_names};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> Config {
    let mut config = Config::default();
    config.limits.allowed_mimes = ["image/jpeg", "image/png"]
        .into_iter()
        .map(String::from)
        .collect();
    config.limits.max_sources = 3;
    config
}

fn http_service(config: &Config) -> BatchService {
    let fetcher = HttpFetcher::new(&config.fetch).unwrap();
    BatchService::new(Arc::new(fetcher), config)
}

async fn serve(server: &MockServer, route: &str, status: u16, mime: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_raw(body.to_vec(), mime))
        .mount(server)
        .await;
}

#[tokio::test]
async fn partial_success_archives_only_accepted_sources() {
    let server = MockServer::start().await;
    serve(&server, "/a.jpg", 200, "image/jpeg", b"jpeg-a").await;
    serve(&server, "/b.jpg", 404, "text/plain", b"missing").await;

    let a = format!("{}/a.jpg", server.uri());
    let b = format!("{}/b.jpg", server.uri());
    let result = http_service(&config())
        .download_all(&[a, b.clone()], &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_partial());
    assert_eq!(
        read_zip_entries(&result.archive),
        vec![("a.jpg".to_string(), b"jpeg-a".to_vec())]
    );
    match result.outcome {
        BatchOutcome::PartialSuccess { errors } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].source, b);
            assert_eq!(errors[0].reason, SourceFailure::HttpStatus(404));
        }
        BatchOutcome::Success => panic!("expected partial success"),
    }
}

#[tokio::test]
async fn full_success_archives_every_source() {
    let server = MockServer::start().await;
    serve(&server, "/one.png", 200, "image/png", b"png-1").await;
    serve(&server, "/two.jpg", 200, "image/jpeg", b"jpeg-2").await;

    let sources = vec![
        format!("{}/one.png", server.uri()),
        format!("{}/two.jpg", server.uri()),
    ];
    let result = http_service(&config())
        .download_all(&sources, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.outcome, BatchOutcome::Success);
    let mut names = zip_entry_names(&result.archive);
    names.sort();
    assert_eq!(names, vec!["one.png", "two.jpg"]);
}

#[tokio::test]
async fn all_forbidden_sources_fail_with_forbidden_content_type() {
    let server = MockServer::start().await;
    serve(&server, "/page", 200, "text/html", b"<html></html>").await;

    let err = http_service(&config())
        .download_all(&[format!("{}/page", server.uri())], &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::ForbiddenContentType { mimes } => assert_eq!(mimes, vec!["text/html"]),
        other => panic!("expected ForbiddenContentType, got {other:?}"),
    }
}

#[tokio::test]
async fn mixed_failures_fail_as_download_failure() {
    let server = MockServer::start().await;
    serve(&server, "/page", 200, "text/html", b"<html></html>").await;
    serve(&server, "/gone.jpg", 500, "text/plain", b"boom").await;

    let sources = vec![
        format!("{}/page", server.uri()),
        format!("{}/gone.jpg", server.uri()),
    ];
    let err = http_service(&config())
        .download_all(&sources, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::AllDownloadsFailed { errors } => {
            assert_eq!(errors.len(), 2);
            assert!(errors.iter().any(|e| e.reason == SourceFailure::HttpStatus(500)));
            assert!(errors.iter().any(|e| e.reason.is_forbidden_mime()));
        }
        other => panic!("expected AllDownloadsFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn too_many_sources_are_rejected_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sources: Vec<String> = (0..4).map(|i| format!("{}/{i}.jpg", server.uri())).collect();
    let err = http_service(&config())
        .download_all(&sources, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::TooManySources {
            requested: 4,
            max: 3
        }
    ));
    server.verify().await;
}

#[tokio::test]
async fn empty_batch_yields_empty_archive() {
    let service = BatchService::new(Arc::new(FakeFetcher::new()), &config());
    let result = service
        .download_all(&[], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.outcome, BatchOutcome::Success);
    assert!(zip_entry_names(&result.archive).is_empty());
}

#[tokio::test]
async fn transport_errors_are_recorded_per_source() {
    let fetcher = FakeFetcher::new()
        .file("ok", "ok.jpg", "image/jpeg", b"ok")
        .error(
            "slow",
            FetchError::Timeout {
                url: "slow".to_string(),
            },
        );
    let service = BatchService::new(Arc::new(fetcher), &config());

    let result = service
        .download_all(&["ok".to_string(), "slow".to_string()], &CancellationToken::new())
        .await
        .unwrap();

    match result.outcome {
        BatchOutcome::PartialSuccess { errors } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].source, "slow");
            assert!(matches!(
                errors[0].reason,
                SourceFailure::Fetch(FetchError::Timeout { .. })
            ));
        }
        BatchOutcome::Success => panic!("expected partial success"),
    }
}

#[tokio::test]
async fn panicked_fetch_counts_as_a_failed_source() {
    let fetcher = FakeFetcher::new().panic("boom");
    let service = BatchService::new(Arc::new(fetcher), &config());

    let err = service
        .download_all(&["boom".to_string()], &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::AllDownloadsFailed { errors } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].source, "boom");
        }
        other => panic!("expected download failure, got {other:?}"),
    }
}

#[tokio::test]
async fn pipeline_failure_aborts_the_whole_batch() {
    let mut config = config();
    config.archive.max_archive_bytes = Some(8);

    let fetcher = FakeFetcher::new()
        .file("big", "big.jpg", "image/jpeg", &[0u8; 64])
        .file("late", "late.jpg", "image/jpeg", b"late")
        .delay("late", Duration::from_millis(200));
    let service = BatchService::new(Arc::new(fetcher), &config);

    let err = service
        .download_all(&["big".to_string(), "late".to_string()], &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Archive(ArchiveError::TooLarge { name, limit }) => {
            assert_eq!(name, "big.jpg");
            assert_eq!(limit, 8);
        }
        other => panic!("expected archive failure, got {other:?}"),
    }
}

#[tokio::test]
async fn caller_cancellation_stops_outstanding_fetches() {
    let fetcher = FakeFetcher::new()
        .file("ok", "ok.jpg", "image/jpeg", b"ok")
        .hang("stuck");
    let service = BatchService::new(Arc::new(fetcher), &config());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(2),
        service.download_all(&["ok".to_string(), "stuck".to_string()], &cancel),
    )
    .await
    .expect("cancelled batch must return promptly")
    .unwrap_err();

    assert!(matches!(err, Error::Cancelled), "got {err:?}");
}

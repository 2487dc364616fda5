use super::*;
use crate::Config;
use crate::fetch::Fetcher;
use crate::test_helpers::FakeFetcher;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::time::Duration;
use tower::ServiceExt;


/// Config used by the API tests: small limits, jpeg/png only
fn test_config() -> Config {
    let mut config = Config::default();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    config.limits.allowed_mimes = ["image/jpeg", "image/png"]
        .into_iter()
        .map(String::from)
        .collect();
    config.limits.max_sources = 3;
    config.limits.max_tasks = 2;
    config.limits.max_task_files = 2;
    config
}

fn test_service(fetcher: impl Fetcher + 'static) -> Arc<Zipload> {
    Arc::new(Zipload::with_fetcher(test_config(), Arc::new(fetcher)))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_router(test_service(FakeFetcher::new()));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_openapi_json_endpoint() {
    let app = create_router(test_service(FakeFetcher::new()));

    let response = app.oneshot(get("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let spec = body_json(response).await;
    assert!(spec["openapi"].as_str().unwrap().starts_with("3."));
    assert!(spec["paths"]["/downloadBatch"]["post"].is_object());
    assert!(spec["paths"]["/checkTask/{id}"]["get"].is_object());
}

#[tokio::test]
async fn test_cors_enabled() {
    let app = create_router(test_service(FakeFetcher::new()));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let mut config = test_config();
    config.api.cors_enabled = false;
    let service = Arc::new(Zipload::with_fetcher(config, Arc::new(FakeFetcher::new())));
    let app = create_router(service);

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[test]
fn test_cors_specific_origins() {
    // Unparseable origins are skipped rather than rejected
    let _layer = build_cors_layer(&["http://localhost:3000".to_string(), "\n".to_string()]);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = create_router(test_service(FakeFetcher::new()));
    let response = app.oneshot(get("/downloads")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_server_stops_on_shutdown() {
    let service = test_service(FakeFetcher::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(serve(listener, Arc::clone(&service)));

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    service.shutdown().await;

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after shutdown")
        .unwrap()
        .unwrap();
}

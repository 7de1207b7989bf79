//! End-to-end tests for the HTTP surface against a mocked listing API.

use rbxservers_server::{AppConfig, build_app};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PLACE_ID: u64 = 1234;
const LISTING_PATH: &str = "/v1/games/1234/servers/Public";

fn test_config(upstream: &MockServer) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.upstream.base_url = upstream.uri();
    cfg.upstream.place_id = PLACE_ID;
    cfg.upstream.backoff_ms = 1;
    cfg.upstream.max_attempts = 2;
    cfg.preload.enabled = false;
    cfg.metrics.enabled = false;
    cfg
}

async fn start_server(
    cfg: &AppConfig,
) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let app = build_app(cfg).expect("build app");

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum_serve(listener, app, rx).await;
    });

    (format!("http://{addr}"), tx, server)
}

async fn axum_serve(
    listener: tokio::net::TcpListener,
    app: axum::Router,
    rx: tokio::sync::oneshot::Receiver<()>,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = rx.await;
        })
        .await
}

fn listing(next_cursor: Option<&str>, ids: &[&str]) -> Value {
    json!({
        "previousPageCursor": null,
        "nextPageCursor": next_cursor,
        "data": ids
            .iter()
            .map(|id| json!({ "id": id, "playing": 3, "maxPlayers": 10 }))
            .collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn servers_returns_wrapped_page_and_caches_it() {
    let upstream = MockServer::start().await;
    let body = listing(Some("page-2"), &["a", "b"]);
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .expect(1)
        .mount(&upstream)
        .await;

    let (base, tx, handle) = start_server(&test_config(&upstream)).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let res = client
            .get(format!("{base}/servers"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        let payload: Value = res.json().await.unwrap();
        assert_eq!(payload["success"], json!(true));
        assert_eq!(payload["data"], body);
        assert!(payload["timestamp"].as_str().is_some_and(|t| t.contains('T')));
    }

    let _ = tx.send(());
    let _ = handle.await;
    upstream.verify().await;
}

#[tokio::test]
async fn servers_forwards_cursor_and_treats_empty_as_first_page() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("cursor", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(None, &["c"])))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param_is_missing("cursor"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(listing(Some("page-2"), &["a"])),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let (base, tx, handle) = start_server(&test_config(&upstream)).await;
    let client = reqwest::Client::new();

    let second: Value = client
        .get(format!("{base}/servers?cursor=page-2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["data"]["data"][0]["id"], json!("c"));

    // `?cursor=` and no cursor share the first page entry
    for url in [format!("{base}/servers?cursor="), format!("{base}/servers")] {
        let first: Value = client.get(url).send().await.unwrap().json().await.unwrap();
        assert_eq!(first["data"]["nextPageCursor"], json!("page-2"));
    }

    let _ = tx.send(());
    let _ = handle.await;
    upstream.verify().await;
}

#[tokio::test]
async fn servers_reports_upstream_failure_as_500() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{ "code": 1, "message": "The cursor is invalid." }]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let (base, tx, handle) = start_server(&test_config(&upstream)).await;

    let res = reqwest::get(format!("{base}/servers?cursor=bogus"))
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    let payload: Value = res.json().await.unwrap();
    assert_eq!(payload["success"], json!(false));
    assert_eq!(payload["error"], json!("The cursor is invalid."));

    let _ = tx.send(());
    let _ = handle.await;
    upstream.verify().await;
}

#[tokio::test]
async fn failed_fetch_is_retried_on_next_request() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(None, &["a"])))
        .mount(&upstream)
        .await;

    let (base, tx, handle) = start_server(&test_config(&upstream)).await;

    let failed = reqwest::get(format!("{base}/servers")).await.unwrap();
    assert_eq!(failed.status(), 500);
    let payload: Value = failed.json().await.unwrap();
    assert_eq!(payload["error"], json!("Service Unavailable"));

    let recovered = reqwest::get(format!("{base}/servers")).await.unwrap();
    assert_eq!(recovered.status(), 200);

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn root_describes_the_service() {
    let upstream = MockServer::start().await;
    let (base, tx, handle) = start_server(&test_config(&upstream)).await;

    let info: Value = reqwest::get(format!("{base}/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["ok"], json!(true));
    assert_eq!(info["placeId"], json!(PLACE_ID));
    assert_eq!(info["cacheTtlMs"], json!(60_000));
    assert!(
        info["endpoints"]
            .as_array()
            .is_some_and(|e| e.contains(&json!("/servers")))
    );

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn health_reports_status_and_uptime() {
    let upstream = MockServer::start().await;
    let (base, tx, handle) = start_server(&test_config(&upstream)).await;

    let health: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], json!("healthy"));
    assert!(health["uptime"].as_f64().is_some_and(|u| u >= 0.0));
    assert!(health["timestamp"].as_str().is_some());

    // Health never touches upstream
    assert!(upstream.received_requests().await.unwrap().is_empty());

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    let upstream = MockServer::start().await;
    let (base, tx, handle) = start_server(&test_config(&upstream)).await;

    let res = reqwest::get(format!("{base}/does-not-exist")).await.unwrap();
    assert_eq!(res.status(), 404);
    let payload: Value = res.json().await.unwrap();
    assert_eq!(payload, json!({ "error": "Not found" }));

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn metrics_unavailable_when_disabled() {
    let upstream = MockServer::start().await;
    let (base, tx, handle) = start_server(&test_config(&upstream)).await;

    let res = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(res.status(), 503);

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn request_id_is_generated_or_echoed() {
    let upstream = MockServer::start().await;
    let (base, tx, handle) = start_server(&test_config(&upstream)).await;
    let client = reqwest::Client::new();

    let generated = client.get(format!("{base}/health")).send().await.unwrap();
    let id = generated
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_eq!(id.len(), 36);

    let echoed = client
        .get(format!("{base}/health"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(
        echoed.headers().get("x-request-id").unwrap(),
        "trace-me"
    );

    let _ = tx.send(());
    let _ = handle.await;
}

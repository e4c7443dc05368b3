use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use httpmock::Method::{DELETE, GET, POST};
use httpmock::MockServer;
use reqwest::Url;
use serde_json::json;

use crate::error::TransportError;
use crate::reload::{ReloadGate, ReloadRequest, ReloadSink, ReloadState};
use crate::transport::{
    is_mutating, is_same_origin, ExemptPaths, HttpRequest, HttpResponse, HttpTransport, Method,
    Transport, TransportObserver,
};

#[derive(Default)]
struct CountingSink(AtomicUsize);

impl ReloadSink for CountingSink {
    fn reload(&self, _request: ReloadRequest) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Answers every request with a fixed status, or fails if `status` is None.
struct FixedTransport {
    status: Option<u16>,
}

#[async_trait]
impl Transport for FixedTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        match self.status {
            Some(status) => Ok(HttpResponse {
                status,
                body: json!({ "ok": true }).to_string(),
            }),
            None => Err(TransportError::Connection("network unreachable".into())),
        }
    }
}

fn origin() -> Url {
    Url::parse("http://campus.local:5000").unwrap()
}

fn observed(status: Option<u16>) -> (TransportObserver, Arc<CountingSink>) {
    let sink = Arc::new(CountingSink::default());
    let gate = Arc::new(ReloadGate::new(sink.clone(), Duration::ZERO));
    let observer = TransportObserver::new(
        Arc::new(FixedTransport { status }),
        origin(),
        ExemptPaths::new(["chatbot"]),
        gate,
    );
    (observer, sink)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[test]
fn only_get_is_read_only() {
    assert!(!is_mutating(&Method::GET));
    assert!(is_mutating(&Method::HEAD));
    assert!(is_mutating(&Method::OPTIONS));
    assert!(is_mutating(&Method::POST));
    assert!(is_mutating(&Method::PUT));
    assert!(is_mutating(&Method::PATCH));
    assert!(is_mutating(&Method::DELETE));
}

#[test]
fn same_origin_resolution() {
    let origin = origin();
    assert!(is_same_origin("", &origin));
    assert!(is_same_origin("/admin/notices", &origin));
    assert!(is_same_origin("admin/notices", &origin));
    assert!(is_same_origin("http://campus.local:5000/api/x", &origin));
    assert!(!is_same_origin("http://campus.local:6000/api/x", &origin));
    assert!(!is_same_origin("https://campus.local:5000/api/x", &origin));
    assert!(!is_same_origin("https://cdn.example.com/upload", &origin));
}

#[test]
fn exempt_paths_match_case_insensitively_on_path_only() {
    let origin = origin();
    let exempt = ExemptPaths::new(["ChatBot", "  "]);
    assert!(exempt.is_exempt("/chatbot/query", &origin));
    assert!(exempt.is_exempt("/api/CHATBOT/feedback", &origin));
    assert!(!exempt.is_exempt("/admin/notices?from=chatbot", &origin));
    assert!(!exempt.is_exempt("/admin/faq", &origin));
}

#[tokio::test]
async fn successful_mutation_schedules_reload() {
    let (observer, sink) = observed(Some(200));
    observer
        .send(HttpRequest::post_json("/admin/notices/5/delete", json!({})))
        .await
        .unwrap();
    settle().await;

    assert_eq!(observer.gate().state(), ReloadState::ReloadScheduled);
    assert_eq!(sink.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn same_origin_options_and_head_schedule_one_reload() {
    let (observer, sink) = observed(Some(200));
    for method in [Method::OPTIONS, Method::HEAD] {
        observer
            .send(HttpRequest::get("/admin/notices/1").with_method(method))
            .await
            .unwrap();
    }
    settle().await;

    assert_eq!(observer.gate().state(), ReloadState::ReloadScheduled);
    assert_eq!(sink.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn queries_failures_and_exempt_paths_never_reload() {
    let (observer, sink) = observed(Some(200));
    observer.send(HttpRequest::get("/api/admin/users")).await.unwrap();
    observer
        .send(HttpRequest::post_json("/chatbot/query", json!({ "query": "hi" })))
        .await
        .unwrap();
    observer
        .send(HttpRequest::post_json("https://cdn.example.com/upload", json!({})))
        .await
        .unwrap();
    settle().await;
    assert_eq!(observer.gate().state(), ReloadState::Idle);

    let (observer, sink_500) = observed(Some(500));
    observer
        .send(HttpRequest::post_json("/admin/faq/1/delete", json!({})))
        .await
        .unwrap();
    settle().await;
    assert_eq!(observer.gate().state(), ReloadState::Idle);

    let (observer, sink_down) = observed(None);
    let err = observer
        .send(HttpRequest::post_json("/admin/faq/1/delete", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Connection(_)));
    assert_eq!(observer.gate().state(), ReloadState::Idle);

    for sink in [sink, sink_500, sink_down] {
        assert_eq!(sink.0.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn concurrent_mutations_schedule_exactly_one_reload() {
    let (observer, sink) = observed(Some(200));
    let observer = Arc::new(observer);

    let calls = (0..12).map(|i| {
        let observer = observer.clone();
        async move {
            observer
                .send(
                    HttpRequest::post_json(format!("/admin/notices/{i}/delete"), json!({}))
                        .with_method(Method::DELETE),
                )
                .await
        }
    });
    let results = futures::future::join_all(calls).await;
    assert!(results.iter().all(|r| r.is_ok()));
    settle().await;

    assert_eq!(sink.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn http_transport_resolves_relative_urls_and_sends_json() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/admin/notices/create")
            .header("content-type", "application/json")
            .body_contains("\"title\":\"Exam schedule\"");
        then.status(200).json_body(json!({ "ok": true, "id": 9 }));
    });

    let transport = HttpTransport::new(&server.base_url(), Some(Duration::from_secs(5))).unwrap();
    let response = transport
        .send(HttpRequest::post_json(
            "/admin/notices/create",
            json!({ "title": "Exam schedule" }),
        ))
        .await
        .unwrap();

    mock.assert();
    assert!(response.is_success());
    assert_eq!(response.json().unwrap()["id"], 9);
}

#[tokio::test]
async fn http_transport_passes_custom_method_and_headers() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(DELETE)
            .path("/api/admin/users/3")
            .header("x-requested-with", "campus-sync");
        then.status(204);
    });

    let transport = HttpTransport::new(&server.base_url(), None).unwrap();
    let response = transport
        .send(
            HttpRequest::get("/api/admin/users/3")
                .with_method(Method::DELETE)
                .with_header("X-Requested-With", "campus-sync"),
        )
        .await
        .unwrap();

    mock.assert();
    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn http_transport_returns_error_statuses_as_responses() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/admin/missing");
        then.status(404).json_body(json!({ "ok": false, "message": "Not found" }));
    });

    let transport = HttpTransport::new(&server.base_url(), None).unwrap();
    let response = transport
        .send(HttpRequest::get("/api/admin/missing"))
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    assert!(!response.is_success());
}

#[tokio::test]
async fn http_transport_reports_unreachable_host() {
    // Port 9 (discard) on localhost is not expected to accept connections.
    let transport = HttpTransport::new("http://127.0.0.1:9", Some(Duration::from_secs(2))).unwrap();
    let err = transport
        .send(HttpRequest::get("/api/admin/users"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransportError::Connection(_) | TransportError::Request(_) | TransportError::Timeout(_)
    ));
}

#[test]
fn http_transport_rejects_bad_origin() {
    assert!(matches!(
        HttpTransport::new("not a url", None),
        Err(TransportError::InvalidUrl(_))
    ));
}

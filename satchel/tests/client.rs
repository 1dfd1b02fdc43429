//! Behavioural tests of the request client against a scripted transport.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use common::{MockTransport, Reply};
use futures::future::join_all;
use http::{Method, Request, Response, StatusCode};
use satchel::{
    BatchRequest, Client, ClientConfig, ErrorCategory, NotificationKind, RequestError,
    RequestOptions, ServiceTransport, TransportError,
};
use satchel_core::RecordingNotifier;
use serde::Deserialize;
use serde_json::json;

fn client(transport: MockTransport) -> Client {
    client_with(transport, ClientConfig::default())
}

fn client_with(transport: MockTransport, config: ClientConfig) -> Client {
    Client::new(transport, config).unwrap()
}

#[tokio::test(start_paused = true)]
async fn fresh_get_is_served_from_cache() {
    let transport = MockTransport::echo();
    let client = client(transport.clone());

    let first = client.get("/api/chapters", RequestOptions::new()).await.unwrap();
    tokio::time::advance(Duration::from_secs(60)).await;
    let second = client.get("/api/chapters", RequestOptions::new()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(transport.call_count(), 1);
    let metrics = client.performance_metrics();
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.cache_hits, 1);
    assert_eq!(metrics.cache_size, 1);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_triggers_fresh_call() {
    let transport = MockTransport::echo();
    let config = ClientConfig::builder()
        .cache_timeout(Duration::from_secs(30))
        .build()
        .unwrap();
    let client = client_with(transport.clone(), config);

    client.get("/api/chapters", RequestOptions::new()).await.unwrap();
    tokio::time::advance(Duration::from_secs(31)).await;
    client.get("/api/chapters", RequestOptions::new()).await.unwrap();

    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn no_cache_and_query_params_bypass_entry() {
    let transport = MockTransport::echo();
    let client = client(transport.clone());

    client.get("/api/concepts", RequestOptions::new()).await.unwrap();
    client
        .get("/api/concepts", RequestOptions::new().no_cache())
        .await
        .unwrap();
    let filtered = client
        .get("/api/concepts", RequestOptions::new().query("chapter", "2"))
        .await
        .unwrap();

    assert_eq!(transport.call_count(), 3);
    assert_eq!(
        filtered.as_json(),
        Some(&json!({"path": "/api/concepts?chapter=2"}))
    );
}

#[tokio::test(start_paused = true)]
async fn identical_concurrent_calls_share_one_network_call() {
    let transport = MockTransport::echo().with_latency(Duration::from_millis(200));
    let client = client(transport.clone());

    let calls = (0..5).map(|_| {
        client.post(
            "/api/save_answer",
            json!({"question": 7, "answer": "b"}),
            RequestOptions::new(),
        )
    });
    let results = join_all(calls).await;

    assert_eq!(transport.call_count(), 1);
    let first = results[0].as_ref().unwrap();
    for result in &results {
        assert_eq!(result.as_ref().unwrap(), first);
    }
    assert_eq!(client.performance_metrics().pending_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn different_bodies_are_not_deduplicated() {
    let transport = MockTransport::echo().with_latency(Duration::from_millis(200));
    let client = client(transport.clone());

    let (a, b) = tokio::join!(
        client.post("/api/save_answer", json!({"question": 1}), RequestOptions::new()),
        client.post("/api/save_answer", json!({"question": 2}), RequestOptions::new()),
    );
    a.unwrap();
    b.unwrap();

    let bodies: Vec<Bytes> = transport.calls().into_iter().map(|call| call.body).collect();
    assert_eq!(bodies.len(), 2);
    assert_ne!(bodies[0], bodies[1]);
}

#[tokio::test(start_paused = true)]
async fn different_binary_bodies_are_not_deduplicated() {
    let transport = MockTransport::echo().with_latency(Duration::from_millis(200));
    let client = client(transport.clone());

    let (a, b) = tokio::join!(
        client.post("/api/upload", Bytes::from_static(&[0xFF]), RequestOptions::new()),
        client.post("/api/upload", Bytes::from_static(&[0xFE]), RequestOptions::new()),
    );
    a.unwrap();
    b.unwrap();

    let mut bodies: Vec<Bytes> = transport.calls().into_iter().map(|call| call.body).collect();
    bodies.sort();
    assert_eq!(
        bodies,
        vec![Bytes::from_static(&[0xFE]), Bytes::from_static(&[0xFF])]
    );
}

#[tokio::test(start_paused = true)]
async fn health_check_does_not_swallow_handlers_of_a_regular_call() {
    let transport = MockTransport::new(|_| Reply::status(503)).with_latency(Duration::from_millis(200));
    let client = client(transport.clone());
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();
    client.on_error(ErrorCategory::ServerError, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (healthy, regular) = tokio::join!(
        client.health_check(),
        client.get("/api/health", RequestOptions::new().retry_attempts(0)),
    );

    assert!(!healthy);
    assert!(regular.is_err());
    assert_eq!(transport.call_count(), 2);
    assert_eq!(handled.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn joined_callers_observe_the_same_failure() {
    let transport =
        MockTransport::new(|_| Reply::status(404)).with_latency(Duration::from_millis(50));
    let client = client(transport.clone());
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();
    client.on_error(ErrorCategory::ClientError, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let results = join_all((0..3).map(|_| client.get("/api/missing", RequestOptions::new()))).await;

    assert_eq!(transport.call_count(), 1);
    for result in results {
        assert_eq!(result.unwrap_err().status(), Some(StatusCode::NOT_FOUND));
    }
    assert_eq!(handled.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn admission_is_bounded_and_fifo() {
    let transport = MockTransport::echo().with_latency(Duration::from_millis(100));
    let config = ClientConfig::builder()
        .max_concurrent_requests(2)
        .build()
        .unwrap();
    let client = client_with(transport.clone(), config);
    let started = tokio::time::Instant::now();

    let urls: Vec<String> = (0..5).map(|id| format!("/api/items/{id}")).collect();
    let results = join_all(urls.iter().map(|url| client.get(url, RequestOptions::new()))).await;
    assert!(results.iter().all(Result::is_ok));

    let calls = transport.calls();
    let order: Vec<&str> = calls.iter().map(|call| call.uri.as_str()).collect();
    assert_eq!(order, urls.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(transport.max_active(), 2);
    // The third call waits for one of the first two to finish.
    assert!(calls[2].at - started >= Duration::from_millis(100));
    assert_eq!(client.performance_metrics().active_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn queued_calls_are_reported() {
    let transport = MockTransport::echo().with_latency(Duration::from_secs(1));
    let config = ClientConfig::builder()
        .max_concurrent_requests(1)
        .build()
        .unwrap();
    let client = client_with(transport, config);

    let background = client.clone();
    let tasks: Vec<_> = (0..3)
        .map(|id| {
            let client = background.clone();
            tokio::spawn(async move {
                client
                    .get(&format!("/api/items/{id}"), RequestOptions::new())
                    .await
            })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let metrics = client.performance_metrics();
    assert_eq!(metrics.active_requests, 1);
    assert_eq!(metrics.queued_requests, 2);
    assert_eq!(metrics.pending_requests, 3);

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(client.performance_metrics().queued_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn server_errors_are_retried_with_exponential_backoff() {
    let transport = MockTransport::new(|_| Reply::status(503));
    let client = client(transport.clone());

    let error = client
        .get("/api/chapters", RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(error.category(), ErrorCategory::ServerError);
    let calls = transport.calls();
    assert_eq!(calls.len(), 4);
    let gaps: Vec<Duration> = calls.windows(2).map(|pair| pair[1].at - pair[0].at).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            Duration::from_millis(4000),
        ]
    );
    let metrics = client.performance_metrics();
    assert_eq!(metrics.failed_requests, 1);
    assert_eq!(metrics.success_rate, 0.0);
}

#[tokio::test(start_paused = true)]
async fn client_errors_fail_immediately() {
    let transport = MockTransport::new(|_| Reply::status(404));
    let client = client(transport.clone());
    let started = tokio::time::Instant::now();

    let error = client
        .get("/api/concepts/999", RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(error.category(), ErrorCategory::ClientError);
    assert_eq!(transport.call_count(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn recovers_when_a_retry_succeeds() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();
    let transport = MockTransport::new(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) < 2 {
            Reply::Fail(TransportError::network("connection reset"))
        } else {
            Reply::ok_json(r#"{"ok":true}"#)
        }
    });
    let client = client(transport.clone());

    let data = client.get("/api/chapters", RequestOptions::new()).await.unwrap();

    assert_eq!(data.as_json(), Some(&json!({"ok": true})));
    assert_eq!(transport.call_count(), 3);
    let metrics = client.performance_metrics();
    assert_eq!(metrics.successful_requests, 1);
    assert_eq!(metrics.failed_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn slow_attempts_time_out_and_are_retried() {
    let transport = MockTransport::echo().with_latency(Duration::from_secs(60));
    let client = client(transport.clone());

    let error = client
        .get(
            "/api/ask",
            RequestOptions::new()
                .timeout(Duration::from_secs(2))
                .retry_attempts(1),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        RequestError::Timeout { timeout, .. } if timeout == Duration::from_secs(2)
    ));
    assert_eq!(error.category(), ErrorCategory::Timeout);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cache_holds_at_most_capacity_entries() {
    let transport = MockTransport::echo();
    let client = client(transport.clone());

    for id in 0..=100 {
        client
            .get(&format!("/api/items/{id}"), RequestOptions::new())
            .await
            .unwrap();
    }
    assert_eq!(client.performance_metrics().cache_size, 100);
    assert_eq!(transport.call_count(), 101);

    // The second-oldest entry survived, the oldest did not.
    client.get("/api/items/1", RequestOptions::new()).await.unwrap();
    assert_eq!(transport.call_count(), 101);
    client.get("/api/items/0", RequestOptions::new()).await.unwrap();
    assert_eq!(transport.call_count(), 102);
}

#[tokio::test(start_paused = true)]
async fn clear_cache_forces_network() {
    let transport = MockTransport::echo();
    let client = client(transport.clone());

    client.get("/api/chapters", RequestOptions::new()).await.unwrap();
    client.get("/api/concepts", RequestOptions::new()).await.unwrap();
    assert_eq!(client.clear_cache_matching("/api/concepts"), 1);
    client.get("/api/chapters", RequestOptions::new()).await.unwrap();
    assert_eq!(transport.call_count(), 2);

    client.clear_cache();
    client.get("/api/chapters", RequestOptions::new()).await.unwrap();
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn unhandled_errors_still_reach_the_caller() {
    let transport = MockTransport::new(|_| Reply::status(400));
    let client = client(transport);

    let error = client
        .post("/api/save_answer", json!({}), RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(error.status(), Some(StatusCode::BAD_REQUEST));
}

#[tokio::test(start_paused = true)]
async fn notify_errors_reports_through_notifier() {
    let transport = MockTransport::new(|_| Reply::status(500));
    let client = client(transport);
    let notifier = Arc::new(RecordingNotifier::new());
    client.notify_errors(notifier.clone());

    client
        .get("/api/chapters", RequestOptions::new().retry_attempts(0))
        .await
        .unwrap_err();
    client
        .get("/api/chapters", RequestOptions::new().retry_attempts(0).silent())
        .await
        .unwrap_err();

    let errors = notifier.of_kind(NotificationKind::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        "The server is having trouble. Please try again later."
    );
}

#[tokio::test(start_paused = true)]
async fn batch_pairs_outcomes_with_requests() {
    let transport = MockTransport::new(|req| {
        if req.uri().path().ends_with("missing") {
            Reply::status(404)
        } else {
            Reply::ok_json(r#"{"ok":true}"#)
        }
    });
    let client = client(transport);

    let outcomes = client
        .batch(vec![
            BatchRequest::get("/api/chapters"),
            BatchRequest::get("/api/missing"),
            BatchRequest::new(
                "/api/ask",
                RequestOptions::new()
                    .method(Method::POST)
                    .body(json!({"q": "x"})),
            ),
        ])
        .await;

    let summary: Vec<(&str, bool)> = outcomes
        .iter()
        .map(|outcome| (outcome.request.url.as_str(), outcome.is_ok()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("/api/chapters", true),
            ("/api/missing", false),
            ("/api/ask", true)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn health_check_probes_once_without_cache() {
    let transport = MockTransport::new(|req| {
        assert_eq!(req.uri().path(), "/api/health");
        Reply::status(503)
    });
    let client = client(transport.clone());
    assert!(!client.health_check().await);
    assert_eq!(transport.call_count(), 1);

    let healthy = MockTransport::new(|_| Reply::ok_json(r#"{"status":"ok"}"#));
    let client = Client::new(healthy.clone(), ClientConfig::default()).unwrap();
    assert!(client.health_check().await);
    assert!(client.health_check().await);
    assert_eq!(healthy.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn typed_json_helpers() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Chapter {
        id: u32,
        title: String,
    }

    let transport = MockTransport::new(|req| match *req.method() {
        Method::GET => Reply::ok_json(r#"[{"id":1,"title":"Cells"}]"#),
        _ => Reply::ok_json(r#"{"id":2,"title":"Genes"}"#),
    });
    let client = client(transport);

    let chapters: Vec<Chapter> = client
        .get_json("/api/chapters", RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(
        chapters,
        vec![Chapter {
            id: 1,
            title: "Cells".to_owned()
        }]
    );

    let created: Chapter = client
        .post_json("/api/chapters", &json!({"title": "Genes"}), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(created.id, 2);

    let error = client
        .get_json::<Chapter>("/api/chapters", RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(error, RequestError::Decode { .. }));
}

#[tokio::test(start_paused = true)]
async fn malformed_json_is_not_retried() {
    let transport = MockTransport::new(|_| Reply::ok_json("{not json"));
    let client = client(transport.clone());

    let error = client
        .get("/api/chapters", RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(error.category(), ErrorCategory::UnknownError);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn runs_over_a_tower_service() {
    let service = tower::service_fn(|req: Request<Bytes>| async move {
        let body = Bytes::from(format!("{} {}", req.method(), req.uri().path()));
        Ok::<_, std::convert::Infallible>(Response::new(body))
    });
    let config = ClientConfig::builder()
        .base_url("http://exam.local")
        .build()
        .unwrap();
    let client = Client::builder()
        .transport(ServiceTransport::new(service))
        .config(config)
        .build()
        .unwrap();

    let data = client.delete("/api/session", RequestOptions::new()).await.unwrap();
    assert_eq!(data.as_text(), Some("DELETE /api/session"));
}

#[test]
fn invalid_config_is_rejected() {
    let config = ClientConfig {
        max_concurrent_requests: 0,
        ..ClientConfig::default()
    };
    assert!(Client::new(MockTransport::echo(), config).is_err());
}

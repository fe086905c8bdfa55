//! Bulk writer tests against a stub `_bulk` endpoint.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use elasticsearch_sink::{ElasticsearchConfig, ElasticsearchSink};
use product_sink::{BatchOutcome, BatchSink, SinkError};
use sync_core::Product;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct RecordedRequest {
    content_type: Option<String>,
    body: String,
}

#[derive(Clone, Default)]
struct StubState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    responses: Arc<Mutex<VecDeque<(StatusCode, String)>>>,
    delay: Duration,
}

async fn bulk(
    State(state): State<StubState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    state.requests.lock().unwrap().push(RecordedRequest {
        content_type: headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    state
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::OK, r#"{"errors":false,"items":[]}"#.to_string()))
}

/// Start a stub bulk endpoint answering with `responses` in order.
async fn start_stub(
    responses: Vec<(StatusCode, &str)>,
    delay: Duration,
) -> anyhow::Result<(String, StubState)> {
    let state = StubState {
        requests: Arc::default(),
        responses: Arc::new(Mutex::new(
            responses
                .into_iter()
                .map(|(status, body)| (status, body.to_string()))
                .collect(),
        )),
        delay,
    };

    let app = Router::new()
        .route("/_bulk", post(bulk))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Ok((format!("http://{addr}"), state))
}

fn sink(endpoint: String, timeout: Duration) -> ElasticsearchSink {
    ElasticsearchSink::new(ElasticsearchConfig {
        endpoint,
        index: "floral-products".to_string(),
        timeout,
        retry_item_errors: true,
    })
    .unwrap()
}

fn products() -> Vec<Product> {
    vec![
        Product {
            id: "a1".to_string(),
            name: "Rose".to_string(),
            description: "Red rose".to_string(),
            category: Some("Flowers".to_string()),
            seller: "Larisa".to_string(),
        },
        Product {
            id: "b2".to_string(),
            name: "Lily".to_string(),
            description: "White lily".to_string(),
            category: None,
            seller: "Danila".to_string(),
        },
    ]
}

#[tokio::test]
async fn test_bulk_write_success() {
    let _ = tracing_subscriber::fmt().with_env_filter("debug").try_init();

    let response = r#"{"took":1,"errors":false,"items":[{"index":{"_id":"a1","status":201}},{"index":{"_id":"b2","status":201}}]}"#;
    let (endpoint, state) = start_stub(vec![(StatusCode::OK, response)], Duration::ZERO)
        .await
        .unwrap();

    let outcome = sink(format!("{endpoint}/"), Duration::from_secs(5))
        .write_batch(&products())
        .await;

    match outcome {
        BatchOutcome::Success { response: body } => assert_eq!(body, response),
        other => panic!("expected success, got {other:?}"),
    }

    let requests = state.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].content_type.as_deref(),
        Some("application/x-ndjson")
    );
    assert_eq!(
        requests[0].body,
        concat!(
            "{\"index\":{\"_index\":\"floral-products\",\"_id\":\"a1\"}}\n",
            "{\"name\":\"Rose\",\"description\":\"Red rose\",\"category\":\"Flowers\",\"seller\":\"Larisa\"}\n",
            "{\"index\":{\"_index\":\"floral-products\",\"_id\":\"b2\"}}\n",
            "{\"name\":\"Lily\",\"description\":\"White lily\",\"seller\":\"Danila\"}\n",
            "\n",
        )
    );
}

#[tokio::test]
async fn test_redirect_range_status_is_success() {
    let (endpoint, _state) = start_stub(vec![(StatusCode::NOT_MODIFIED, "")], Duration::ZERO)
        .await
        .unwrap();

    let outcome = sink(endpoint, Duration::from_secs(5))
        .write_batch(&products())
        .await;
    assert!(outcome.is_success(), "{outcome:?}");
}

#[tokio::test]
async fn test_server_error_is_failure_with_body() {
    let (endpoint, _state) = start_stub(
        vec![(StatusCode::INTERNAL_SERVER_ERROR, "cluster unavailable")],
        Duration::ZERO,
    )
    .await
    .unwrap();

    let outcome = sink(endpoint, Duration::from_secs(5))
        .write_batch(&products())
        .await;

    match outcome {
        BatchOutcome::Failure {
            error: SinkError::Status { status },
            response,
        } => {
            assert_eq!(status, 500);
            assert_eq!(response.as_deref(), Some("cluster unavailable"));
        }
        other => panic!("expected status failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_error_threshold() {
    let (endpoint, _state) = start_stub(vec![(StatusCode::BAD_REQUEST, "bad")], Duration::ZERO)
        .await
        .unwrap();

    let outcome = sink(endpoint, Duration::from_secs(5))
        .write_batch(&products())
        .await;
    assert!(matches!(
        outcome,
        BatchOutcome::Failure {
            error: SinkError::Status { status: 400 },
            ..
        }
    ));
}

#[tokio::test]
async fn test_retryable_item_errors_are_partial_failure() {
    let response = r#"{"errors":true,"items":[{"index":{"_id":"a1","status":201}},{"index":{"_id":"b2","status":429,"error":{"type":"es_rejected_execution_exception"}}}]}"#;
    let (endpoint, _state) = start_stub(vec![(StatusCode::OK, response)], Duration::ZERO)
        .await
        .unwrap();

    let outcome = sink(endpoint, Duration::from_secs(5))
        .write_batch(&products())
        .await;

    match outcome {
        BatchOutcome::Failure {
            error: SinkError::PartialFailure { retryable, total },
            response: Some(body),
        } => {
            assert_eq!((retryable, total), (1, 2));
            assert_eq!(body, response);
        }
        other => panic!("expected partial failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_item_is_success_by_default() {
    let response = r#"{"errors":true,"items":[{"index":{"_id":"a1","status":201}},{"index":{"_id":"b2","status":400,"error":{"type":"mapper_parsing_exception"}}}]}"#;
    let (endpoint, state) = start_stub(
        vec![(StatusCode::OK, response), (StatusCode::OK, response)],
        Duration::ZERO,
    )
    .await
    .unwrap();

    let sink = ElasticsearchSink::new(ElasticsearchConfig {
        endpoint,
        ..Default::default()
    })
    .unwrap();

    // A mapping error never clears up, so the batch must not be retried
    for _ in 0..2 {
        let outcome = sink.write_batch(&products()).await;
        assert!(outcome.is_success(), "{outcome:?}");
        assert_eq!(outcome.response(), Some(response));
    }
    assert_eq!(state.requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_mixed_item_errors_fail_on_retryable_only() {
    let response = r#"{"errors":true,"items":[{"index":{"_id":"a1","status":400,"error":{}}},{"index":{"_id":"b2","status":503,"error":{}}}]}"#;
    let (endpoint, _state) = start_stub(vec![(StatusCode::OK, response)], Duration::ZERO)
        .await
        .unwrap();

    let outcome = sink(endpoint, Duration::from_secs(5))
        .write_batch(&products())
        .await;
    assert!(matches!(
        outcome,
        BatchOutcome::Failure {
            error: SinkError::PartialFailure {
                retryable: 1,
                total: 2
            },
            ..
        }
    ));
}

#[tokio::test]
async fn test_retryable_item_errors_ignored_when_disabled() {
    let response = r#"{"errors":true,"items":[{"index":{"_id":"a1","status":429,"error":{}}}]}"#;
    let (endpoint, _state) = start_stub(vec![(StatusCode::OK, response)], Duration::ZERO)
        .await
        .unwrap();

    let sink = ElasticsearchSink::new(ElasticsearchConfig {
        endpoint,
        retry_item_errors: false,
        ..Default::default()
    })
    .unwrap();

    assert!(sink.write_batch(&products()).await.is_success());
}

#[tokio::test]
async fn test_empty_batch_makes_no_request() {
    let (endpoint, state) = start_stub(vec![], Duration::ZERO).await.unwrap();

    let outcome = sink(endpoint, Duration::from_secs(5)).write_batch(&[]).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.response(), Some(""));
    assert!(state.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_timeout_is_failure() {
    let (endpoint, _state) = start_stub(vec![(StatusCode::OK, "late")], Duration::from_secs(2))
        .await
        .unwrap();

    let outcome = sink(endpoint, Duration::from_millis(100))
        .write_batch(&products())
        .await;

    assert!(
        matches!(
            outcome,
            BatchOutcome::Failure {
                error: SinkError::Timeout,
                response: None
            }
        ),
        "{outcome:?}"
    );
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let outcome = sink(format!("http://{addr}"), Duration::from_secs(5))
        .write_batch(&products())
        .await;

    assert!(
        matches!(
            outcome,
            BatchOutcome::Failure {
                error: SinkError::Transport(_),
                response: None
            }
        ),
        "{outcome:?}"
    );
}

//! Integration tests for OpenRouterOracle.
//!
//! Uses wiremock for HTTP mocking. Tests cover the completion request shape,
//! attribution headers, status mapping, timeouts, malformed envelopes and the
//! daily budget probe.

use std::time::Duration;

use evaluator_lib::adapters::OpenRouterOracle;
use grading_core::evaluation::{build_request, EvaluationInput};
use grading_core::ports::{GradingOracle, OracleBudget, PortError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_oracle(mock_server: &MockServer) -> OpenRouterOracle {
    OpenRouterOracle::new(mock_server.uri(), "sk-or-test", Duration::from_secs(5))
        .expect("failed to create oracle")
        .with_attribution("https://problems.example", "Problem Bank")
        .with_daily_budget(20.0)
}

fn input() -> EvaluationInput {
    EvaluationInput {
        problem_text: "Translate the five sentences.".to_string(),
        reference_solution: "1. The dog sleeps. ...".to_string(),
        user_answer: "1. The dog is sleeping. ...".to_string(),
        problem_media_url: None,
        solution_media_url: None,
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "gen-123",
        "model": "google/gemini-flash-1.5",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 900, "completion_tokens": 150, "total_tokens": 1050}
    })
}

#[tokio::test]
async fn test_invoke_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-or-test"))
        .and(header("http-referer", "https://problems.example"))
        .and(header("x-title", "Problem Bank"))
        .and(body_partial_json(json!({
            "model": "google/gemini-flash-1.5",
            "temperature": 0.3,
            "max_tokens": 1000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"scores\": {}}")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let oracle = create_test_oracle(&mock_server);
    let request = build_request(&input(), "google/gemini-flash-1.5");
    let response = oracle.invoke(&request).await.expect("invoke failed");

    assert_eq!(response.first_content(), Some("{\"scores\": {}}"));
    assert_eq!(response.model.as_deref(), Some("google/gemini-flash-1.5"));
    assert_eq!(response.usage.map(|u| u.total()), Some(1050));
}

#[tokio::test]
async fn test_invoke_sends_image_parts_for_multimodal_models() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let oracle = create_test_oracle(&mock_server);
    let mut input = input();
    input.problem_media_url = Some("https://cdn.example/problem.png".to_string());
    let request = build_request(&input, "google/gemini-flash-1.5");
    assert_eq!(request.image_count(), 1);

    let body = serde_json::to_value(&request).unwrap();
    let parts = body["messages"][0]["content"].as_array().expect("expected content parts");
    assert_eq!(parts[0]["type"], "text");
    assert_eq!(parts[1]["type"], "image_url");
    assert_eq!(parts[1]["image_url"]["url"], "https://cdn.example/problem.png");

    oracle.invoke(&request).await.expect("invoke failed");
}

#[tokio::test]
async fn test_invoke_error_status_is_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
        .mount(&mock_server)
        .await;

    let oracle = create_test_oracle(&mock_server);
    let err = oracle
        .invoke(&build_request(&input(), "google/gemini-flash-1.5"))
        .await
        .unwrap_err();

    match err {
        PortError::Unavailable { status, body } => {
            assert_eq!(status, Some(503));
            assert_eq!(body, "upstream overloaded");
        }
        other => panic!("expected Unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invoke_rate_limited_is_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let oracle = create_test_oracle(&mock_server);
    let err = oracle
        .invoke(&build_request(&input(), "google/gemini-flash-1.5"))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Unavailable { status: Some(429), .. }));
}

#[tokio::test]
async fn test_invoke_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("{}"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let oracle = OpenRouterOracle::new(mock_server.uri(), "sk-or-test", Duration::from_millis(200))
        .expect("failed to create oracle");
    let err = oracle
        .invoke(&build_request(&input(), "google/gemini-flash-1.5"))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn test_invoke_malformed_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&mock_server)
        .await;

    let oracle = create_test_oracle(&mock_server);
    let err = oracle
        .invoke(&build_request(&input(), "google/gemini-flash-1.5"))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Malformed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_budget_exceeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/key"))
        .and(header("authorization", "Bearer sk-or-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"label": "sk-or-...", "usage": 140.2, "usage_daily": 21.5}
        })))
        .mount(&mock_server)
        .await;

    let status = create_test_oracle(&mock_server).check_daily_budget().await;
    assert!(status.exceeded);
    assert_eq!(status.used_usd, 21.5);
    assert_eq!(status.limit_usd, 20.0);
}

#[tokio::test]
async fn test_budget_under_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"usage_daily": 3.25}})),
        )
        .mount(&mock_server)
        .await;

    let status = create_test_oracle(&mock_server).check_daily_budget().await;
    assert!(!status.exceeded);
    assert_eq!(status.used_usd, 3.25);
}

#[tokio::test]
async fn test_budget_probe_failure_fails_open() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/key"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let status = create_test_oracle(&mock_server).check_daily_budget().await;
    assert!(!status.exceeded);
    assert_eq!(status.used_usd, 0.0);
    assert_eq!(status.limit_usd, 20.0);
}

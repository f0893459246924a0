//! Web tools against a mock server.
#![cfg(feature = "web-tools")]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parley::tools::builtin::web::{scrape, search, NO_RESULTS};
use parley::tools::{ToolExecutor, ToolRegistry};
use parley::types::ToolCall;

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn search_returns_the_abstract() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("q", "rust language"))
        .and(query_param("format", "json"))
        .and(query_param("no_html", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AbstractText": "Rust is a general-purpose programming language."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let answer = search(&server.uri(), "rust language", TIMEOUT).await.unwrap();
    assert_eq!(answer, "Rust is a general-purpose programming language.");
}

#[tokio::test]
async fn search_without_abstract_reports_no_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"AbstractText": ""})))
        .mount(&server)
        .await;

    assert_eq!(search(&server.uri(), "zzzz", TIMEOUT).await.unwrap(), NO_RESULTS);
}

#[tokio::test]
async fn scrape_returns_visible_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><script>track()</script><body><h1>Hello</h1><p>plain   words</p></body></html>",
        ))
        .mount(&server)
        .await;

    let text = scrape(&format!("{}/page", server.uri()), TIMEOUT).await.unwrap();
    assert_eq!(text, "Hello plain words");
}

#[tokio::test]
async fn slow_page_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<p>late</p>")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = scrape(&server.uri(), Duration::from_millis(50)).await.unwrap_err();
    assert!(err.to_string().contains("Timeout after 50ms"), "{err}");

    let err = search(&server.uri(), "slow", Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Timeout after 50ms"), "{err}");
}

#[tokio::test]
async fn configured_request_timeout_reaches_the_tool() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let config = parley::config::ParleyConfig {
        request_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let executor = ToolExecutor::new(std::sync::Arc::new(ToolRegistry::builtin(&config)));
    let call = ToolCall::new(
        "c2",
        "scrape_page",
        json!({"url": server.uri()}).to_string(),
    );

    let result = executor.execute(&call).await;
    assert!(result
        .error()
        .is_some_and(|e| e.contains("Timeout after 50ms")));
}

#[tokio::test]
async fn failing_page_becomes_tool_error_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = parley::config::ParleyConfig {
        search_base_url: server.uri(),
        ..Default::default()
    };
    let executor = ToolExecutor::new(std::sync::Arc::new(ToolRegistry::builtin(&config)));
    let call = ToolCall::new(
        "c1",
        "scrape_page",
        json!({"url": format!("{}/gone", server.uri())}).to_string(),
    );

    let result = executor.execute(&call).await;
    assert!(result
        .error()
        .is_some_and(|e| e.starts_with("Tool scrape_page failed: page returned 500")));
}

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Suggestion service answering `query` with `[{name, domain}]`
pub async fn mock_suggest_server(query: &str, entries: &[(&str, &str)]) -> MockServer {
    let server = MockServer::start().await;
    let body: Vec<Value> = entries
        .iter()
        .map(|(name, domain)| json!({ "name": name, "domain": domain, "logo": null }))
        .collect();

    Mock::given(method("GET"))
        .and(path("/companies/suggest"))
        .and(query_param("query", query))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    server
}

/// Company-data service expecting a bearer token, answering one domain
pub async fn mock_company_data_server(domain: &str, api_key: &str, body: Value) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/companies/find"))
        .and(query_param("domain", domain))
        .and(header("authorization", format!("Bearer {}", api_key).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    server
}

/// Server that answers every request with `status` after `delay`
pub async fn mock_slow_server(status: u16, delay: Duration) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status).set_delay(delay).set_body_json(json!({})))
        .mount(&server)
        .await;

    server
}

/// Serves an HTML page at `url_path`
pub async fn mock_html_page(url_path: &str, html: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    server
}

/// Chat-completion endpoint whose single reply carries `content`
pub async fn mock_assistant_server(content: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-test",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })))
        .mount(&server)
        .await;

    server
}

//! Request pipeline integration tests against an in-process origin.

mod helpers;

use helpers::mock_server::{ok_json, ok_with_body, MockServer};

use guise::{Client, Error};
use serde_json::json;

#[tokio::test]
async fn get_returns_body_text() {
    let server = MockServer::start_static("Hello").await;
    let client = Client::new();

    let response = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.version(), "HTTP/1.1");
    assert_eq!(response.text().await.unwrap(), "Hello");
}

#[tokio::test]
async fn post_body_is_echoed() {
    let server = MockServer::start(|req| {
        ok_json(&json!({ "data": String::from_utf8_lossy(&req.body) }))
    })
    .await;
    let client = Client::new();

    let response = client
        .post(server.url("/post"))
        .body(&b"hello"[..])
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"], "hello");
}

#[tokio::test]
async fn bearer_auth_header_reaches_the_server() {
    let server = MockServer::start(|req| {
        ok_json(&json!({ "authorization": req.header("authorization") }))
    })
    .await;
    let client = Client::new();

    let response = client
        .get(server.url("/anything"))
        .bearer_auth("token")
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["authorization"], "Bearer token");
}

#[tokio::test]
async fn basic_auth_is_base64_encoded() {
    let server = MockServer::start(|req| {
        ok_json(&json!({ "authorization": req.header("authorization") }))
    })
    .await;
    let client = Client::new();

    let response = client
        .get(server.url("/anything"))
        .basic_auth("user", Some("pass".to_string()))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    // base64("user:pass")
    assert_eq!(body["authorization"], "Basic dXNlcjpwYXNz");
}

#[tokio::test]
async fn query_parameters_are_appended() {
    let server = MockServer::start(|req| ok_with_body(req.target.as_bytes())).await;
    let client = Client::new();

    let response = client
        .get(server.url("/search"))
        .query([("q", "fingerprint"), ("page", "2")])
        .send()
        .await
        .unwrap();
    let target = response.text().await.unwrap();
    assert_eq!(target, "/search?q=fingerprint&page=2");
}

#[tokio::test]
async fn json_body_sets_content_type() {
    let server = MockServer::start(|req| {
        ok_json(&json!({
            "content_type": req.header("content-type"),
            "body": String::from_utf8_lossy(&req.body),
        }))
    })
    .await;
    let client = Client::new();

    let response = client
        .post(server.url("/post"))
        .json(&json!({ "key": "value" }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["content_type"], "application/json");
    assert_eq!(body["body"], r#"{"key":"value"}"#);
}

#[tokio::test]
async fn form_body_is_url_encoded() {
    let server = MockServer::start(|req| {
        ok_json(&json!({
            "content_type": req.header("content-type"),
            "body": String::from_utf8_lossy(&req.body),
        }))
    })
    .await;
    let client = Client::new();

    let response = client
        .post(server.url("/post"))
        .form([("a", "1"), ("b", "two words")])
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["content_type"], "application/x-www-form-urlencoded");
    assert_eq!(body["body"], "a=1&b=two+words");
}

#[tokio::test]
async fn multipart_body_carries_boundary_and_parts() {
    let server = MockServer::start(|req| {
        ok_json(&json!({
            "content_type": req.header("content-type"),
            "body": String::from_utf8_lossy(&req.body),
        }))
    })
    .await;
    let client = Client::new();

    let form = guise::Form::new()
        .text("field", "value")
        .part(
            guise::Part::bytes("file", &b"contents"[..])
                .filename("a.txt")
                .mime("text/plain"),
        );
    let response = client
        .post(server.url("/post"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();

    let content_type = body["content_type"].as_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let boundary = content_type.split("boundary=").nth(1).unwrap();

    let payload = body["body"].as_str().unwrap();
    assert!(payload.contains(&format!("--{boundary}")));
    assert!(payload.contains("name=\"field\""));
    assert!(payload.contains("filename=\"a.txt\""));
    assert!(payload.contains("contents"));
}

#[tokio::test]
async fn base_url_joins_relative_paths() {
    let server = MockServer::start(|req| ok_with_body(req.target.as_bytes())).await;
    let client = Client::builder()
        .base_url(server.url("/api/"))
        .build()
        .unwrap();

    let response = client.get("users").send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "/api/users");
}

#[tokio::test]
async fn conflicting_body_variants_fail_before_io() {
    let client = Client::new();
    let err = client
        .post("http://127.0.0.1:1/unreachable")
        .body(&b"raw"[..])
        .text("also text")
        .send()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[tokio::test]
async fn timeout_is_reported_distinctly() {
    // A listener that accepts and never responds.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            held.push(stream);
        }
    });

    let client = Client::new();
    let err = client
        .get(format!("http://{addr}/hang"))
        .timeout(std::time::Duration::from_millis(200))
        .send()
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn idempotent_get_retries_a_dead_connection() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let n = seen.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                // First connection: die before responding.
                drop(stream);
            } else {
                tokio::spawn(async move {
                    use tokio::io::AsyncReadExt;
                    let mut buf = vec![0u8; 4096];
                    let _ = stream.read(&mut buf).await;
                    let _ = stream
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
                        .await;
                });
            }
        }
    });

    let client = Client::new();
    let response = client
        .get(format!("http://{addr}/retry"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(attempts.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn one_shot_free_functions_share_a_client() {
    let server = MockServer::start_static("shared").await;
    let response = guise::get(server.url("/")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "shared");
}

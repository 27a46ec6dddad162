//! Cookie store behavior through the full request path.

mod helpers;

use helpers::mock_server::{ok_json, MockServer};

use guise::Client;
use serde_json::json;

fn cookie_echo_response(req: &helpers::mock_server::SeenRequest) -> Vec<u8> {
    if req.target == "/set" {
        let body = b"ok";
        format!(
            "HTTP/1.1 200 OK\r\nSet-Cookie: sid=abc123; Path=/\r\nContent-Length: {}\r\n\r\nok",
            body.len()
        )
        .into_bytes()
    } else {
        ok_json(&json!({ "cookie": req.header("cookie") }))
    }
}

#[tokio::test]
async fn set_cookie_is_persisted_and_replayed() {
    let server = MockServer::start(cookie_echo_response).await;
    let client = Client::builder().cookie_store(true).build().unwrap();

    let response = client.get(server.url("/set")).send().await.unwrap();
    assert_eq!(response.cookies().len(), 1);
    response.text().await.unwrap();

    let response = client.get(server.url("/read")).send().await.unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["cookie"], "sid=abc123");
}

#[tokio::test]
async fn cookie_store_is_disabled_by_default() {
    let server = MockServer::start(cookie_echo_response).await;
    let client = Client::new();

    let response = client.get(server.url("/set")).send().await.unwrap();
    // The response still exposes the cookie it observed.
    assert_eq!(response.cookies().len(), 1);
    response.text().await.unwrap();

    let response = client.get(server.url("/read")).send().await.unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["cookie"], serde_json::Value::Null);
}

#[tokio::test]
async fn explicit_set_cookie_round_trip() {
    let client = Client::builder().cookie_store(true).build().unwrap();
    client
        .set_cookie("https://a.example.com/account", "token=xyz; Path=/")
        .unwrap();

    let cookies = client.get_cookies("https://a.example.com/account").unwrap();
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name, "token");
    assert_eq!(cookies[0].value, "xyz");

    // Sibling subdomain must not see the cookie.
    assert!(client.get_cookies("https://b.example.com/").unwrap().is_empty());
}

#[tokio::test]
async fn clear_cookies_empties_the_jar() {
    let client = Client::builder().cookie_store(true).build().unwrap();
    client.set_cookie("https://example.com/", "a=1").unwrap();
    assert_eq!(client.get_cookies("https://example.com/").unwrap().len(), 1);

    client.clear_cookies();
    assert!(client.get_cookies("https://example.com/").unwrap().is_empty());
}

#[tokio::test]
async fn per_call_cookie_header_wins_over_jar() {
    let server = MockServer::start(cookie_echo_response).await;
    let client = Client::builder().cookie_store(true).build().unwrap();
    client
        .set_cookie(&server.url("/"), "sid=from_jar")
        .unwrap();

    let response = client
        .get(server.url("/read"))
        .header("Cookie", "sid=explicit")
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["cookie"], "sid=explicit");
}

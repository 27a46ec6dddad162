//! Header merge precedence and wire-order preservation.

mod helpers;

use helpers::mock_server::{ok_with_body, MockServer};

use guise::{Client, Impersonate};

#[tokio::test]
async fn profile_defaults_reach_the_wire_in_browser_order() {
    let server = MockServer::start(|req| ok_with_body(req.raw_head.as_bytes())).await;
    let client = Client::builder()
        .impersonate(Impersonate::Chrome131)
        .build()
        .unwrap();

    let response = client.get(server.url("/")).send().await.unwrap();
    let head = response.text().await.unwrap();

    let ua = head.find("User-Agent:").expect("User-Agent missing");
    let accept = head.find("Accept:").expect("Accept missing");
    let lang = head.find("Accept-Language:").expect("Accept-Language missing");
    assert!(ua < accept, "Chrome emits User-Agent before Accept");
    assert!(accept < lang, "Chrome emits Accept before Accept-Language");
    assert!(head.contains("sec-ch-ua:"));
    assert!(head.contains("Chrome/131"));
}

#[tokio::test]
async fn per_call_override_keeps_profile_position() {
    let server = MockServer::start(|req| ok_with_body(req.raw_head.as_bytes())).await;
    let client = Client::new();

    let response = client
        .get(server.url("/"))
        .header("User-Agent", "custom-agent/1.0")
        .send()
        .await
        .unwrap();
    let head = response.text().await.unwrap();

    // Value overridden, position unchanged: still before Accept.
    assert!(head.contains("User-Agent: custom-agent/1.0"));
    assert!(!head.contains("Chrome/131"));
    let ua = head.find("User-Agent:").unwrap();
    let accept = head.find("Accept:").unwrap();
    assert!(ua < accept);
}

#[tokio::test]
async fn session_defaults_sit_between_profile_and_call() {
    let server = MockServer::start(|req| ok_with_body(req.raw_head.as_bytes())).await;
    let client = Client::builder()
        .default_headers([("X-Session", "session"), ("X-Both", "session")])
        .build()
        .unwrap();

    let response = client
        .get(server.url("/"))
        .header("X-Call", "call")
        .header("X-Both", "call")
        .send()
        .await
        .unwrap();
    let head = response.text().await.unwrap();

    assert!(head.contains("X-Session: session"));
    assert!(head.contains("X-Call: call"));
    // Later layer wins on value.
    assert!(head.contains("X-Both: call"));
    assert!(!head.contains("X-Both: session"));
}

#[tokio::test]
async fn headers_order_forces_a_total_order() {
    let server = MockServer::start(|req| ok_with_body(req.raw_head.as_bytes())).await;
    let client = Client::builder()
        .headers_order(["accept-language", "user-agent", "accept"])
        .build()
        .unwrap();

    let response = client.get(server.url("/")).send().await.unwrap();
    let head = response.text().await.unwrap();

    let lang = head.find("Accept-Language:").unwrap();
    let ua = head.find("User-Agent:").unwrap();
    let accept = head.find("Accept:").unwrap();
    assert!(lang < ua, "explicit order puts Accept-Language first");
    assert!(ua < accept);
}

#[tokio::test]
async fn firefox_profile_sends_firefox_headers() {
    let server = MockServer::start(|req| ok_with_body(req.raw_head.as_bytes())).await;
    let client = Client::builder()
        .impersonate(Impersonate::Firefox133)
        .build()
        .unwrap();

    let response = client.get(server.url("/")).send().await.unwrap();
    let head = response.text().await.unwrap();

    assert!(head.contains("Firefox/133"));
    assert!(head.contains("Gecko/20100101"));
    assert!(!head.contains("sec-ch-ua"), "Firefox sends no client hints");
}

#[tokio::test]
async fn user_agent_override_applies_at_session_level() {
    let server = MockServer::start(|req| ok_with_body(req.raw_head.as_bytes())).await;
    let client = Client::builder()
        .user_agent("scripted-agent/2.0")
        .build()
        .unwrap();

    let response = client.get(server.url("/")).send().await.unwrap();
    let head = response.text().await.unwrap();
    assert!(head.contains("User-Agent: scripted-agent/2.0"));
}

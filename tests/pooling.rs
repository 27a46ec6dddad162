//! Connection reuse and pool accounting.

mod helpers;

use helpers::mock_server::{ok_with_body, MockServer};

use guise::{Client, Impersonate, Update};

#[tokio::test]
async fn sequential_requests_reuse_one_connection() {
    let server = MockServer::start_static("Hello").await;
    let client = Client::new();

    for _ in 0..3 {
        let response = client.get(server.url("/")).send().await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "Hello");
    }

    assert_eq!(
        server.connection_count(),
        1,
        "drained keep-alive responses must reuse the transport"
    );
}

#[tokio::test]
async fn pooled_responses_do_not_cross_talk() {
    let server = MockServer::start(|req| ok_with_body(req.target.as_bytes())).await;
    let client = Client::new();

    let first = client.get(server.url("/first")).send().await.unwrap();
    let first_body = first.text().await.unwrap();
    let second = client.get(server.url("/second")).send().await.unwrap();
    let second_body = second.text().await.unwrap();

    assert_eq!(first_body, "/first");
    assert_eq!(second_body, "/second");
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn profile_update_retires_pooled_connections() {
    let server = MockServer::start_static("Hello").await;
    let client = Client::new();

    let response = client.get(server.url("/")).send().await.unwrap();
    response.text().await.unwrap();
    assert_eq!(server.connection_count(), 1);

    // New profile, new pool key: the old connection is never rewritten.
    client
        .update(Update {
            impersonate: Some(Impersonate::Firefox133),
            ..Default::default()
        })
        .unwrap();

    let response = client.get(server.url("/")).send().await.unwrap();
    response.text().await.unwrap();
    assert_eq!(server.connection_count(), 2);
}

#[tokio::test]
async fn unconsumed_response_discards_its_connection() {
    let server = MockServer::start_static("HelloHelloHello").await;
    let client = Client::new();

    // Drop the response without reading the body: the connection is dirty
    // and must not be reused.
    let response = client.get(server.url("/")).send().await.unwrap();
    drop(response);

    let response = client.get(server.url("/")).send().await.unwrap();
    response.text().await.unwrap();
    assert_eq!(server.connection_count(), 2);
}

#[tokio::test]
async fn concurrent_requests_open_parallel_connections() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("guise=debug")
        .try_init();

    let server = MockServer::start_static("Hello").await;
    let client = Client::new();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let client = client.clone();
        let url = server.url("/");
        tasks.push(tokio::spawn(async move {
            let response = client.get(url).send().await.unwrap();
            response.text().await.unwrap()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), "Hello");
    }

    // More than one transport, but bounded by the per-key cap.
    assert!(server.connection_count() >= 1);
    assert!(server.connection_count() <= 6);
}

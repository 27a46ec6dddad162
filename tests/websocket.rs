//! WebSocket subsystem against an in-process echo server.

mod helpers;

use helpers::ws_server::WsEchoServer;

use guise::ws::Message;
use guise::Client;

#[tokio::test]
async fn text_echo_round_trip() {
    let server = WsEchoServer::start().await;
    let client = Client::new();

    let mut ws = client.websocket(server.url("/echo")).send().await.unwrap();
    assert_eq!(ws.status(), 101);

    ws.send(Message::text("ping")).await.unwrap();
    let message = ws.recv().await.unwrap().unwrap();
    assert_eq!(message, Message::Text("ping".into()));
    assert_eq!(message.as_bytes(), b"ping");
}

#[tokio::test]
async fn binary_echo_round_trip() {
    let server = WsEchoServer::start().await;
    let client = Client::new();

    let mut ws = client.websocket(server.url("/echo")).send().await.unwrap();
    let payload = vec![0u8, 1, 2, 255, 254];
    ws.send(Message::binary(payload.clone())).await.unwrap();
    let message = ws.recv().await.unwrap().unwrap();
    assert_eq!(message, Message::Binary(payload.into()));
}

#[tokio::test]
async fn close_handshake_reaches_closed_state() {
    let server = WsEchoServer::start().await;
    let client = Client::new();

    let mut ws = client.websocket(server.url("/echo")).send().await.unwrap();
    ws.send(Message::close()).await.unwrap();

    // The peer echo surfaces once as a Close message.
    let message = ws.recv().await.unwrap().unwrap();
    assert!(matches!(message, Message::Close { code: 1000, .. }));

    // Past Closed, receive is a terminal end-of-sequence, not an error.
    assert!(ws.recv().await.unwrap().is_none());
    assert!(ws.recv().await.unwrap().is_none());

    // Sending past Closed is refused.
    let err = ws.send(Message::text("late")).await.unwrap_err();
    assert!(matches!(err, guise::Error::StreamClosed(_)));
}

#[tokio::test]
async fn close_method_completes_the_handshake() {
    let server = WsEchoServer::start().await;
    let client = Client::new();

    let ws = client.websocket(server.url("/echo")).send().await.unwrap();
    ws.close().await.unwrap();
}

#[tokio::test]
async fn split_halves_operate_independently() {
    let server = WsEchoServer::start().await;
    let client = Client::new();

    let ws = client.websocket(server.url("/echo")).send().await.unwrap();
    let (sender, mut receiver) = ws.split();

    // Receiver waits on its own task while the sender pushes from here.
    let recv_task = tokio::spawn(async move {
        let mut seen = Vec::new();
        for _ in 0..3 {
            match receiver.recv().await.unwrap() {
                Some(Message::Text(text)) => seen.push(text),
                other => panic!("unexpected message {other:?}"),
            }
        }
        seen
    });

    for n in 0..3 {
        sender.send(Message::text(format!("msg-{n}"))).await.unwrap();
    }
    let seen = recv_task.await.unwrap();
    assert_eq!(seen, vec!["msg-0", "msg-1", "msg-2"]);
}

#[tokio::test]
async fn subprotocol_is_negotiated() {
    let server = WsEchoServer::start().await;
    let client = Client::new();

    let ws = client
        .websocket(server.url("/echo"))
        .protocols(["chat", "fallback"])
        .send()
        .await
        .unwrap();
    assert_eq!(ws.protocol(), Some("chat"));
}

#[tokio::test]
async fn data_payload_saying_close_is_not_a_close_frame() {
    let server = WsEchoServer::start().await;
    let client = Client::new();

    let mut ws = client.websocket(server.url("/echo")).send().await.unwrap();
    // An in-band "close" payload is application data; the session stays
    // open and the echo comes back as text.
    ws.send(Message::text("close")).await.unwrap();
    let message = ws.recv().await.unwrap().unwrap();
    assert_eq!(message, Message::Text("close".into()));

    ws.send(Message::text("still open")).await.unwrap();
    let message = ws.recv().await.unwrap().unwrap();
    assert_eq!(message, Message::Text("still open".into()));
}

#[tokio::test]
async fn upgrade_against_plain_http_server_fails() {
    let http = helpers::mock_server::MockServer::start_static("not a websocket").await;
    let client = Client::new();

    let url = http.url("/echo").replace("http://", "ws://");
    let err = client.websocket(url).send().await.unwrap_err();
    assert!(matches!(err, guise::Error::WebSocket(_)));
}

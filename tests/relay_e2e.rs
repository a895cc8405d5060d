//! End-to-end tests driving the relay over real sockets

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use relay_rs::{RelayServer, ServerConfig, StaticTokenVerifier, UserId};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start a relay on the given port with two known tokens.
async fn start_server(port: u16) -> Arc<RelayServer<StaticTokenVerifier>> {
    let config = ServerConfig::default().bind(([127, 0, 0, 1], port).into());
    let verifier = StaticTokenVerifier::new()
        .with_token("tok-A", "u1")
        .with_token("tok-B", "u2");

    let server = Arc::new(RelayServer::new(config, verifier));
    let task_server = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = task_server.run().await;
    });
    server
}

/// Connect, retrying until the listener is up.
async fn connect(url: &str) -> WsClient {
    for _ in 0..100 {
        if let Ok((ws, _)) = tokio_tungstenite::connect_async(url).await {
            return ws;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server did not come up for {url}");
}

/// Receive the next JSON text frame, skipping control frames.
async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended unexpectedly")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("valid JSON frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Receive the close frame, skipping anything else.
async fn recv_close(ws: &mut WsClient) -> (u16, String) {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close");
        match msg {
            Some(Ok(Message::Close(Some(frame)))) => {
                return (u16::from(frame.code), frame.reason.into_owned());
            }
            Some(Ok(Message::Close(None))) => panic!("close frame carried no reason"),
            Some(Ok(_)) => continue,
            Some(Err(e)) => panic!("websocket error while awaiting close: {e}"),
            None => panic!("stream ended without a close frame"),
        }
    }
}

/// Poll until the registry holds `expected` connections.
async fn wait_for_connections(server: &RelayServer<StaticTokenVerifier>, expected: usize) {
    for _ in 0..100 {
        if server.registry().connection_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "registry never reached {expected} connections (currently {})",
        server.registry().connection_count().await
    );
}

#[tokio::test]
async fn test_subscribe_then_receive_market_data() {
    let server = start_server(39811).await;
    let mut ws = connect("ws://127.0.0.1:39811/?token=tok-A").await;

    ws.send(Message::text(r#"{"type":"subscribe","channel":"AAPL"}"#))
        .await
        .expect("send subscribe");
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "subscribed", "channel": "AAPL"})
    );

    let delivered = server
        .router()
        .broadcast_market_data("AAPL", json!({"price": 150}))
        .await;
    assert_eq!(delivered, 1);
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "market_data", "channel": "AAPL", "data": {"price": 150}})
    );

    // A bad frame gets an error response without dropping the connection
    ws.send(Message::text(r#"{"type":"subscribe"}"#))
        .await
        .expect("send bad subscribe");
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"error": "Channel not specified"})
    );

    ws.send(Message::text(r#"{"type":"unsubscribe","channel":"AAPL"}"#))
        .await
        .expect("send unsubscribe");
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "unsubscribed", "channel": "AAPL"})
    );
}

#[tokio::test]
async fn test_missing_token_is_rejected_before_registration() {
    let server = start_server(39812).await;
    let mut ws = connect("ws://127.0.0.1:39812/").await;

    let (code, reason) = recv_close(&mut ws).await;
    assert_eq!(code, 1008);
    assert_eq!(reason, "Authentication required");

    // Never reached the registry
    assert_eq!(server.registry().connection_count().await, 0);
    assert_eq!(server.stats().snapshot().total_connections, 0);
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let server = start_server(39813).await;
    let mut ws = connect("ws://127.0.0.1:39813/?token=bogus").await;

    let (code, reason) = recv_close(&mut ws).await;
    assert_eq!(code, 1008);
    assert_eq!(reason, "Invalid token");

    assert_eq!(server.registry().connection_count().await, 0);
}

#[tokio::test]
async fn test_reconnect_replaces_prior_connection() {
    let server = start_server(39814).await;

    let mut first = connect("ws://127.0.0.1:39814/?token=tok-A").await;
    wait_for_connections(&server, 1).await;

    let mut second = connect("ws://127.0.0.1:39814/?token=tok-A").await;

    // The first connection is closed with the replacement reason
    let (code, reason) = recv_close(&mut first).await;
    assert_eq!(code, 1000);
    assert_eq!(reason, "Replaced by new connection");

    // Only the second connection remains reachable
    wait_for_connections(&server, 1).await;
    assert_eq!(server.stats().snapshot().total_connections, 2);

    // Unicast lands on the replacement
    let delivered = server
        .router()
        .broadcast_order_update(&UserId::new("u1"), json!({"orderId": "o-9"}))
        .await;
    assert!(delivered);
    assert_eq!(
        recv_json(&mut second).await,
        json!({"type": "order_update", "data": {"orderId": "o-9"}})
    );
}

#[tokio::test]
async fn test_order_update_for_unknown_user_is_noop() {
    let server = start_server(39815).await;

    // "u2" has never connected; no delivery, no error
    let delivered = server
        .router()
        .broadcast_order_update(&UserId::new("u2"), json!({"orderId": "o-1"}))
        .await;
    assert!(!delivered);

    // Connected but differently-identified clients are unaffected
    let mut ws = connect("ws://127.0.0.1:39815/?token=tok-A").await;
    ws.send(Message::text(r#"{"type":"subscribe","channel":"SPY"}"#))
        .await
        .expect("send subscribe");
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "subscribed", "channel": "SPY"})
    );
}

#[tokio::test]
async fn test_disconnect_deregisters_promptly() {
    let server = start_server(39816).await;

    let mut ws = connect("ws://127.0.0.1:39816/?token=tok-B").await;
    wait_for_connections(&server, 1).await;

    ws.close(None).await.expect("close");
    wait_for_connections(&server, 0).await;

    // Fan-out after disconnect quietly delivers nothing
    let delivered = server
        .router()
        .broadcast_order_update(&UserId::new("u2"), json!({"orderId": "o-2"}))
        .await;
    assert!(!delivered);
}

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use slotfloor_server::{router, spawn_floor};
use slotfloor_session::FloorConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(config: FloorConfig) -> SocketAddr {
    let (state, _actor) = spawn_floor(config, 64);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    socket
}

async fn send(socket: &mut Socket, value: Value) {
    socket.send(Message::Text(value.to_string())).await.unwrap();
}

/// Read events until one of type `kind` arrives.
async fn expect(socket: &mut Socket, kind: &str) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let message = socket.next().await.expect("socket open").unwrap();
            if let Message::Text(text) = message {
                let value: Value = serde_json::from_str(&text).unwrap();
                if value["type"] == kind {
                    return value;
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
}

#[tokio::test]
async fn customize_spin_and_claim_over_websocket() {
    let addr = start_server(FloorConfig {
        reveal_delay_ms: 50,
        seed: Some(7),
        ..FloorConfig::default()
    })
    .await;
    let mut socket = connect(addr).await;

    send(&mut socket, json!({"type": "customize", "name": "Lucky", "color": 255})).await;
    let init = expect(&mut socket, "init").await;
    assert_eq!(init["player"]["name"], "Lucky");
    assert_eq!(init["player"]["balance"], 1_000);
    assert_eq!(init["devices"].as_array().unwrap().len(), 90);
    let cost = init["devices"][0]["cost"].as_i64().unwrap();

    send(&mut socket, json!({"type": "spinOrClaim", "deviceId": 0})).await;
    let started = expect(&mut socket, "spinStarted").await;
    assert_eq!(started["newBalance"], 1_000 - cost);

    let complete = expect(&mut socket, "deviceSpinComplete").await;
    assert_eq!(complete["deviceId"], 0);
    assert_eq!(complete["result"]["symbols"].as_array().unwrap().len(), 3);
    let payout = complete["result"]["winAmount"].as_i64().unwrap();

    send(&mut socket, json!({"type": "spinOrClaim", "deviceId": 0})).await;
    let result = expect(&mut socket, "result").await;
    assert_eq!(result["claimed"], true);
    assert_eq!(result["credited"], payout);
    assert_eq!(result["newBalance"], 1_000 - cost + payout);
}

#[tokio::test]
async fn errors_and_departures_reach_the_right_sockets() {
    let addr = start_server(FloorConfig {
        seed: Some(3),
        ..FloorConfig::default()
    })
    .await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    send(&mut alice, json!({"type": "customize"})).await;
    let alice_id = expect(&mut alice, "init").await["playerId"].clone();
    send(&mut bob, json!({"type": "customize"})).await;
    expect(&mut bob, "init").await;
    expect(&mut alice, "playerJoined").await;

    send(&mut alice, json!({"type": "spinOrClaim", "deviceId": 5})).await;
    expect(&mut alice, "spinStarted").await;
    send(&mut bob, json!({"type": "spinOrClaim", "deviceId": 5})).await;
    let error = expect(&mut bob, "error").await;
    assert_eq!(error["code"], "DEVICE_UNAVAILABLE");
    assert_eq!(error["deviceId"], 5);

    // Garbage is ignored and the connection stays usable.
    bob.send(Message::Text("not json".to_string())).await.unwrap();
    send(&mut bob, json!({"type": "spinOrClaim", "deviceId": 9999})).await;
    assert_eq!(expect(&mut bob, "error").await["code"], "NOT_FOUND");

    alice.close(None).await.unwrap();
    let left = expect(&mut bob, "playerLeft").await;
    assert_eq!(left["playerId"], alice_id);
    expect(&mut bob, "devicesUpdate").await;
}

#[tokio::test]
async fn health_and_metrics_endpoints() {
    let addr = start_server(FloorConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("floor_spins_started_total"));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.ends_with("ok"));
}

//! Exercises `TestClient` end to end against a real broker: a client
//! session sends a request, the extension session replies, and the
//! response round-trips back carrying the client's own id.

use std::net::SocketAddr;
use std::time::Duration;

use protocol::{Response, RuntimeTuning};
use test_client::TestClient;

async fn spawn_broker() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    tokio::spawn(broker::server::run(addr, RuntimeTuning::default(), std::future::pending()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

#[tokio::test]
async fn request_forwarded_to_extension_and_response_routed_back() {
    let addr = spawn_broker().await;
    let url = format!("ws://{addr}");

    let extension = TestClient::connect(&url).await.unwrap();
    extension.handshake("ext-under-test", "1.0.0").await.unwrap();

    let client = TestClient::connect(&url).await.unwrap();
    let client_request = tokio::spawn(async move {
        client
            .request("tabs.getAll", None, serde_json::json!({}))
            .await
    });

    let forwarded = extension.next_request().await.expect("request forwarded");
    assert_eq!(forwarded.action, "tabs.getAll");

    extension
        .reply(Response::ok(forwarded.id, serde_json::json!([{"id": 1}])))
        .await
        .unwrap();

    let response = client_request.await.unwrap().unwrap();
    assert_eq!(response.result.unwrap()[0]["id"], 1);
}

#[tokio::test]
async fn unsolicited_events_are_not_delivered_to_the_extension_session() {
    let addr = spawn_broker().await;
    let url = format!("ws://{addr}");

    let extension = TestClient::connect(&url).await.unwrap();
    extension.handshake("ext-1", "1.0.0").await.unwrap();

    let timeout = tokio::time::timeout(Duration::from_millis(200), extension.next_event()).await;
    assert!(timeout.is_err(), "extension session should receive no fan-out events");
}

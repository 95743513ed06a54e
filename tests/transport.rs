//! End-to-end tests against a scripted in-process service.
//!
//! Each test stands up a real TCP listener that speaks the brace-framed JSON
//! protocol, then drives the public client API against it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;

use feedlink::protocol::{Framer, Request, Response, encode};
use feedlink::{Error, Feed, FeedClient, KeyType, Token, ValueType};

/// Installs a log subscriber once per process; honors `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Scripted Service
// ============================================================================

/// Spawns a service that answers every request with `handler`'s reply.
///
/// Returns the bound address and a counter of accepted connections.
async fn spawn_service<F>(handler: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(Request) -> Option<Response> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handler = Arc::new(handler);
    let accepted = Arc::new(AtomicUsize::new(0));
    let accepted_clone = Arc::clone(&accepted);

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            accepted_clone.fetch_add(1, Ordering::SeqCst);

            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let mut framer = Framer::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    for frame in framer.push(&buf[..n]) {
                        let Ok(request) = serde_json::from_slice::<Request>(&frame) else {
                            continue;
                        };
                        if let Some(reply) = handler(request) {
                            let bytes = encode(&reply).expect("encode reply");
                            if stream.write_all(&bytes).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });

    (addr, accepted)
}

async fn client_for(addr: SocketAddr, call_timeout: Duration) -> FeedClient {
    init_tracing();
    FeedClient::builder()
        .host("127.0.0.1")
        .port(addr.port())
        .basic_auth("longshine", "secret")
        .retry_interval(Duration::from_millis(100))
        .call_timeout(call_timeout)
        .build()
        .await
        .expect("build client")
}

fn sample_feed() -> Feed {
    Feed::new("temperature")
        .with_key_type(KeyType::Date)
        .with_value_type(ValueType::Number)
}

// ============================================================================
// Request / Response Round Trips
// ============================================================================

#[tokio::test]
async fn find_round_trips_feed_with_credentials() {
    let (addr, _) = spawn_service(|request| {
        assert_eq!(request.method, "GET");
        assert_eq!(request.resource, "/feeds/temperature");
        // base64("longshine:secret")
        assert_eq!(
            request.get_header("authorization"),
            Some("BASIC bG9uZ3NoaW5lOnNlY3JldA==")
        );

        let body = serde_json::to_value(sample_feed()).expect("feed body");
        Some(Response::new(200).token(request.token).body(body))
    })
    .await;

    let client = client_for(addr, Duration::from_secs(3)).await;

    let found = client
        .feeds()
        .find("temperature")
        .await
        .expect("find")
        .expect("feed exists");

    assert_eq!(found, sample_feed());
    client.shutdown();
}

#[tokio::test]
async fn create_and_update_map_statuses() {
    let (addr, _) = spawn_service(|request| {
        let status = match request.method.as_str() {
            "POST" => 201,
            "PUT" => 204,
            _ => 500,
        };
        Some(Response::new(status).token(request.token))
    })
    .await;

    let client = client_for(addr, Duration::from_secs(3)).await;

    client.feeds().create(&sample_feed()).await.expect("create");
    client.feeds().update(&sample_feed()).await.expect("update");

    client.shutdown();
}

#[tokio::test]
async fn missing_feed_is_none() {
    let (addr, _) =
        spawn_service(|request| Some(Response::new(404).token(request.token))).await;

    let client = client_for(addr, Duration::from_secs(3)).await;

    let found = client.feeds().find("nowhere").await.expect("find");
    assert!(found.is_none());

    client.shutdown();
}

#[tokio::test]
async fn service_failure_surfaces_status() {
    let (addr, _) =
        spawn_service(|request| Some(Response::new(500).token(request.token))).await;

    let client = client_for(addr, Duration::from_secs(3)).await;

    let err = client.feeds().create(&sample_feed()).await.unwrap_err();
    assert!(matches!(err, Error::Status { status: 500, .. }));

    client.shutdown();
}

// ============================================================================
// Timeouts
// ============================================================================

#[tokio::test]
async fn silent_service_yields_timeout_within_bounds() {
    // Accepts and reads, never replies.
    let (addr, _) = spawn_service(|_| None).await;

    let call_timeout = Duration::from_millis(300);
    let client = client_for(addr, call_timeout).await;

    let started = Instant::now();
    let err = client.feeds().find("silent").await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, Error::RequestTimeout { .. }));
    assert!(err.is_timeout());
    assert!(!err.is_connection_error());
    assert!(elapsed >= call_timeout);
    // One wait cycle, not several.
    assert!(elapsed < call_timeout * 3);

    client.shutdown();
}

#[tokio::test]
async fn unreachable_service_yields_connection_timeout() {
    // Bind then drop a listener so the port is free but refusing.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let call_timeout = Duration::from_millis(300);
    let client = client_for(addr, call_timeout).await;

    let err = client.feeds().find("anywhere").await.unwrap_err();

    assert!(matches!(err, Error::ConnectionTimeout { .. }));
    assert!(err.is_timeout());
    assert!(err.is_connection_error());

    client.shutdown();
}

// ============================================================================
// Pooling
// ============================================================================

#[tokio::test]
async fn sequential_calls_reuse_one_connection() {
    let (addr, accepted) = spawn_service(|request| {
        let body = serde_json::to_value(sample_feed()).expect("feed body");
        Some(Response::new(200).token(request.token).body(body))
    })
    .await;

    let client = client_for(addr, Duration::from_secs(3)).await;

    for _ in 0..3 {
        client
            .feeds()
            .find("temperature")
            .await
            .expect("find")
            .expect("feed exists");
    }

    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    client.shutdown();
}

#[tokio::test]
async fn lost_connection_is_replaced_on_next_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);

    // First connection answers one request, then the read loop below closes
    // it; later connections answer normally.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let accepted = Arc::new(AtomicUsize::new(0));
    let accepted_clone = Arc::clone(&accepted);

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let connection_index = accepted_clone.fetch_add(1, Ordering::SeqCst);
            let calls = Arc::clone(&calls_clone);

            tokio::spawn(async move {
                let mut framer = Framer::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    for frame in framer.push(&buf[..n]) {
                        let request: Request =
                            serde_json::from_slice(&frame).expect("parse request");
                        calls.fetch_add(1, Ordering::SeqCst);

                        let reply = Response::new(204).token(request.token);
                        let bytes = encode(&reply).expect("encode");
                        stream.write_all(&bytes).await.expect("write");

                        if connection_index == 0 {
                            // Drop the first connection after its first call.
                            return;
                        }
                    }
                }
            });
        }
    });

    let client = client_for(addr, Duration::from_secs(3)).await;

    client.feeds().update(&sample_feed()).await.expect("first");

    // Wait for the client side to notice the close.
    tokio::time::sleep(Duration::from_millis(100)).await;

    client.feeds().update(&sample_feed()).await.expect("second");

    assert_eq!(accepted.load(Ordering::SeqCst), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    client.shutdown();
}

// ============================================================================
// Push Commands
// ============================================================================

#[tokio::test]
async fn push_invokes_handler_once_and_replies_with_original_token() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let (reply_tx, reply_rx) = oneshot::channel::<Response>();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut framer = Framer::new();
        let mut buf = [0u8; 4096];

        // Answer the priming request.
        let n = stream.read(&mut buf).await.expect("read request");
        for frame in framer.push(&buf[..n]) {
            let request: Request = serde_json::from_slice(&frame).expect("parse");
            let reply = Response::new(204).token(request.token);
            stream
                .write_all(&encode(&reply).expect("encode"))
                .await
                .expect("write");
        }

        // Push a command down the open connection.
        let push = Request::with_token("cmd", "/feeds/temperature", Token::new("push-42"));
        stream
            .write_all(&encode(&push).expect("encode push"))
            .await
            .expect("write push");

        // Collect the handler's reply.
        let n = stream.read(&mut buf).await.expect("read reply");
        for frame in framer.push(&buf[..n]) {
            let reply: Response = serde_json::from_slice(&frame).expect("parse reply");
            let _ = reply_tx.send(reply);
            return;
        }
    });

    let client = client_for(addr, Duration::from_secs(3)).await;

    let invocations = Arc::new(AtomicUsize::new(0));
    let invocations_clone = Arc::clone(&invocations);
    client.on_push(move |request| {
        invocations_clone.fetch_add(1, Ordering::SeqCst);
        assert_eq!(request.method, "cmd");
        Some(Response::new(200).body(json!({"ack": true})))
    });

    // Prime the pool so a connection exists for the push.
    client.feeds().update(&sample_feed()).await.expect("prime");

    let reply = timeout(Duration::from_secs(2), reply_rx)
        .await
        .expect("reply in time")
        .expect("reply sent");

    assert_eq!(reply.status, 200);
    assert_eq!(reply.token, Some(Token::new("push-42")));
    assert_eq!(reply.body, Some(json!({"ack": true})));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    client.shutdown();
}

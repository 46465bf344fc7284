// tests/connector_tests.rs
use async_trait::async_trait;
use chrono::Utc;
use hyper::{Body, Method, Request, StatusCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tower::Service;

use store_connector::health::HealthMonitor;
use store_connector::server::{AppState, ConnectionTimeouts, RequestHandler, ServerBuilder};
use store_connector::store::{store_check, Store, StoreError};

/// Store double whose reachability can be flipped at runtime.
struct FlakyStore {
    up: Arc<AtomicBool>,
}

#[async_trait]
impl Store for FlakyStore {
    async fn health(&self) -> HashMap<String, String> {
        let mut report = HashMap::new();
        if self.up.load(Ordering::SeqCst) {
            report.insert("status".to_string(), "up".to_string());
            report.insert("message".to_string(), "It's healthy".to_string());
        } else {
            report.insert("status".to_string(), "down".to_string());
            report.insert(
                "error".to_string(),
                "db down: connection refused".to_string(),
            );
        }
        report
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn flaky_store(up: bool) -> (Arc<dyn Store>, Arc<AtomicBool>) {
    let flag = Arc::new(AtomicBool::new(up));
    let store = Arc::new(FlakyStore { up: flag.clone() });
    (store, flag)
}

#[tokio::test(start_paused = true)]
async fn test_sampler_records_fresh_healthy_status() {
    // interval = 10ms, check always true, run 35ms, cancel.
    let (store, _) = flaky_store(true);
    let monitor = Arc::new(HealthMonitor::new(
        store_check(store),
        Duration::from_millis(10),
    ));

    let task = tokio::spawn(monitor.clone().start());
    sleep(Duration::from_millis(35)).await;
    monitor.shutdown();
    let cancelled_at = Utc::now();
    task.await.unwrap().unwrap();

    let status = monitor.current_status().await.expect("sampler ticked");
    assert!(status.is_healthy);
    assert!(cancelled_at - status.last_checked <= chrono::Duration::milliseconds(10));
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_surfaces_as_down_through_facade() {
    let (store, _) = flaky_store(false);

    // The sampler sees the failure as a false observation, not an error.
    let monitor = Arc::new(HealthMonitor::new(
        store_check(store.clone()),
        Duration::from_millis(10),
    ));
    let task = tokio::spawn(monitor.clone().start());
    sleep(Duration::from_millis(25)).await;
    monitor.shutdown();
    task.await.unwrap().unwrap();
    assert!(!monitor.current_status().await.unwrap().is_healthy);

    // The facade serves the store's own diagnostic report.
    let state = Arc::new(AppState {
        store,
        monitor,
        cached: false,
        metrics: None,
    });
    let mut handler = RequestHandler::new(state);
    let req = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = handler.call(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "down");
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test(start_paused = true)]
async fn test_sampler_tracks_store_recovery() {
    let (store, up) = flaky_store(false);
    let monitor = Arc::new(HealthMonitor::new(
        store_check(store),
        Duration::from_millis(10),
    ));

    let task = tokio::spawn(monitor.clone().start());
    sleep(Duration::from_millis(25)).await;
    assert!(!monitor.current_status().await.unwrap().is_healthy);

    up.store(true, Ordering::SeqCst);
    sleep(Duration::from_millis(25)).await;
    monitor.shutdown();
    task.await.unwrap().unwrap();

    assert!(monitor.current_status().await.unwrap().is_healthy);
}

#[tokio::test]
async fn test_slow_request_head_gets_cut_off() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (store, _) = flaky_store(true);
    let monitor = Arc::new(HealthMonitor::new(
        store_check(store.clone()),
        Duration::from_secs(60),
    ));
    let state = Arc::new(AppState {
        store,
        monitor,
        cached: false,
        metrics: None,
    });

    let timeouts = ConnectionTimeouts {
        read: Duration::from_millis(200),
        write: Duration::from_secs(1),
        idle: Duration::from_secs(1),
    };
    tokio::spawn(
        ServerBuilder::new(addr)
            .with_handler(RequestHandler::new(state))
            .with_timeouts(timeouts)
            .serve_on(listener),
    );

    // Deliver a partial request head, then go silent.
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET / HTTP/1.1\r\nHost: x").await.unwrap();

    let mut buf = Vec::new();
    let closed = timeout(Duration::from_secs(3), client.read_to_end(&mut buf)).await;
    assert!(closed.is_ok(), "server left the slow connection open");
}

#[tokio::test(start_paused = true)]
async fn test_push_consumer_observes_updates() {
    let (store, _) = flaky_store(true);
    let monitor = Arc::new(HealthMonitor::new(
        store_check(store),
        Duration::from_millis(10),
    ));
    let mut updates = monitor.subscribe();

    let task = tokio::spawn(monitor.clone().start());

    timeout(Duration::from_millis(200), updates.changed())
        .await
        .expect("a sample should be published within the timeout")
        .unwrap();
    let published = (*updates.borrow()).expect("published status");
    assert!(published.is_healthy);

    monitor.shutdown();
    task.await.unwrap().unwrap();

    assert!(monitor.current_status().await.unwrap().is_healthy);
}

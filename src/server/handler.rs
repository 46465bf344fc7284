// src/server/handler.rs
use crate::health::HealthMonitor;
use crate::metrics::MetricsCollector;
use crate::store::Store;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;
use uuid::Uuid;

/// Shared collaborators behind the HTTP facade.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub monitor: Arc<HealthMonitor>,
    /// Serve `/health` from the sampler's cache instead of a fresh store
    /// round-trip.
    pub cached: bool,
    pub metrics: Option<Arc<MetricsCollector>>,
}

#[derive(Clone)]
pub struct RequestHandler {
    state: Arc<AppState>,
}

impl RequestHandler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = self.state.clone();
        Box::pin(async move {
            let request_id = Uuid::new_v4();
            let method = req.method().clone();
            let path = req.uri().path().to_string();

            let response = route(&state, &method, &path).await;
            let status = response.status();

            if let Some(metrics) = &state.metrics {
                metrics.record_http_request(metric_path_label(&path), status.as_u16());
            }
            tracing::info!(%request_id, %method, %path, status = status.as_u16(), "handled request");

            Ok(response)
        })
    }
}

/// Label values stay bounded to the known routes; arbitrary request paths all
/// collapse into one value.
fn metric_path_label(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        _ => "other",
    }
}

async fn route(state: &AppState, method: &Method, path: &str) -> Response<Body> {
    if method != Method::GET {
        return json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &json!({"error": "method not allowed"}),
        );
    }

    match path {
        "/" => json_response(StatusCode::OK, &json!({"message": "Hello World"})),
        "/health" => health_response(state).await,
        _ => json_response(StatusCode::NOT_FOUND, &json!({"error": "not found"})),
    }
}

async fn health_response(state: &AppState) -> Response<Body> {
    if state.cached {
        match state.monitor.current_status().await {
            Some(status) => json_response(StatusCode::OK, &status),
            // The sampler has not completed a tick yet.
            None => json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                &json!({"status": "unknown", "message": "no health sample recorded yet"}),
            ),
        }
    } else {
        let report = state.store.health().await;
        json_response(StatusCode::OK, &report)
    }
}

fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .unwrap()
}

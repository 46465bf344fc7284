// src/server/builder.rs
use crate::server::listener::bind_tcp;
use anyhow::Result;
use hyper::{server::conn::Http, Body, Request, Response};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::Service;

/// Per-connection service limits, enforced at the accept loop.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTimeouts {
    /// Time allowed for a client to deliver its request head.
    pub read: Duration,
    /// Time allowed for a single request to be answered.
    pub write: Duration,
    /// Total lifetime of a kept-alive connection.
    pub idle: Duration,
}

impl Default for ConnectionTimeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(10),
            write: Duration::from_secs(30),
            idle: Duration::from_secs(60),
        }
    }
}

/// Builder pattern so `main.rs` can inject its handler.
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    handler: Option<H>,
    timeouts: ConnectionTimeouts,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handler: None,
            timeouts: ConnectionTimeouts::default(),
        }
    }

    /// Inject the request handler (usually wraps [`crate::server::RequestHandler`]).
    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_timeouts(mut self, timeouts: ConnectionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Consume the builder, bind the TCP listener, spawn one hyper task per
    /// connection.
    pub async fn serve(self) -> Result<()> {
        let listener = bind_tcp(self.addr).await?;
        tracing::info!("HTTP server listening on {}", self.addr);
        self.serve_on(listener).await
    }

    /// Accept loop over an already-bound listener.
    ///
    /// Each connection is bounded three ways: the request head must arrive
    /// within `read`, each response within `write` (tower timeout around the
    /// handler), and the connection as a whole is closed after `idle`.
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        let handler = self.handler.expect("handler must be set via with_handler()");
        let timeouts = self.timeouts;

        loop {
            let (stream, peer) = listener.accept().await?;
            let svc = tower::timeout::Timeout::new(handler.clone(), timeouts.write);

            tokio::spawn(async move {
                let mut http = Http::new();
                http.http1_header_read_timeout(timeouts.read);

                match tokio::time::timeout(timeouts.idle, http.serve_connection(stream, svc)).await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => tracing::warn!(%peer, %err, "connection error"),
                    Err(_) => tracing::debug!(%peer, "connection exceeded idle timeout, closing"),
                }
            });
        }
    }
}

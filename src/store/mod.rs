// src/store/mod.rs
mod postgres;

pub use postgres::PostgresStore;

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to configure store connection: {0}")]
    Connect(#[source] sqlx::Error),
}

/// A backing data store the connector reports on.
///
/// `health` is a diagnostic check, not a query interface: it returns a
/// key/value report carrying at minimum a `status` key of `"up"` or `"down"`,
/// and never fails — transport errors are folded into a `"down"` report.
#[async_trait]
pub trait Store: Send + Sync {
    async fn health(&self) -> HashMap<String, String>;

    async fn close(&self) -> Result<(), StoreError>;
}

/// Adapt a store's diagnostic report into the boolean predicate the health
/// monitor samples.
pub fn store_check(store: Arc<dyn Store>) -> impl Fn() -> BoxFuture<'static, bool> {
    move || {
        let store = store.clone();
        Box::pin(async move {
            store
                .health()
                .await
                .get("status")
                .map(|s| s == "up")
                .unwrap_or(false)
        })
    }
}

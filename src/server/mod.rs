// src/server/mod.rs
pub mod builder;
pub mod handler;
pub mod listener;

pub use builder::{ConnectionTimeouts, ServerBuilder};
pub use handler::{AppState, RequestHandler};

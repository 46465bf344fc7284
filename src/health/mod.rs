// src/health/mod.rs
mod monitor;
mod status;

pub use monitor::HealthMonitor;
pub use status::HealthStatus;

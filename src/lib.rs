// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod redis;
pub mod telemetry;

// Domain
pub mod directory;
pub mod event;
pub mod notification;
pub mod transport;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;

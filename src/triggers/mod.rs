//! Event sources feeding the dispatcher.
//!
//! - `http`: `POST /api/v1/events`, one event per request
//! - `redis`: Pub/Sub subscriber on the configured channels

mod http;
mod redis;

pub use http::{receive_event, EventResponse};
pub use redis::RedisSubscriber;

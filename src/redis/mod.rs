//! Redis connectivity
//!
//! - `RedisPool`: shared multiplexed connection for directory lookups
//! - `ExponentialBackoff`: reconnect delays for the Pub/Sub trigger

mod backoff;
mod pool;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use pool::{PoolError, RedisPool};

use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::directory::create_directory;
use crate::notification::NotificationDispatcher;
use crate::redis::RedisPool;
use crate::transport::create_transport;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub dispatcher: Arc<NotificationDispatcher>,
    /// Present when a Redis-backed component is configured
    pub redis_pool: Option<Arc<RedisPool>>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the dispatcher and its collaborators from configuration
    pub fn new(settings: Settings) -> Self {
        let redis_pool = if settings.directory.backend == "redis" || settings.redis.subscriber_enabled {
            match RedisPool::new(settings.redis.clone()) {
                Ok(pool) => Some(Arc::new(pool)),
                Err(e) => {
                    tracing::error!(error = %e, url = %settings.redis.url, "Invalid Redis configuration");
                    None
                }
            }
        } else {
            None
        };

        let directory = create_directory(&settings, redis_pool.clone());
        let transport = create_transport(&settings.transport);
        let dispatcher = NotificationDispatcher::from_directory(&settings.dispatcher, directory, transport);

        Self::with_components(settings, Arc::new(dispatcher), redis_pool)
    }

    /// Assemble state from prebuilt components
    pub fn with_components(
        settings: Settings,
        dispatcher: Arc<NotificationDispatcher>,
        redis_pool: Option<Arc<RedisPool>>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            dispatcher,
            redis_pool,
            start_time: Instant::now(),
        }
    }
}
